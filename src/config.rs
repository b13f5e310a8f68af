//! Grid and join configuration.
//!
//! Configuration is built once per run, validated, and then shared read-only
//! with every stage. Both compared collections must be partitioned with the
//! same [`GridConfig`].
use crate::error::{GridJoinError, Result};
use gridjoin_types::bbox::BoundingBox2D;
use serde::de::Error;
use serde::{Deserialize, Serialize};

/// Global extent and division count of the uniform grid.
///
/// # Example
///
/// ```rust
/// use gridjoin::GridConfig;
///
/// let json = r#"{
///     "extent": { "min_x": -180.0, "min_y": -90.0, "max_x": 180.0, "max_y": 90.0 },
///     "divisions": 50
/// }"#;
/// let grid: GridConfig = serde_json::from_str(json).unwrap();
/// assert!(grid.validate().is_ok());
/// assert_eq!(grid.epsilon, 1e-9);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    /// Spatial extent covered by the grid; features outside are clamped to border cells
    #[serde(default = "GridConfig::default_extent")]
    pub extent: BoundingBox2D,

    /// Number of divisions along each axis (N x N cells)
    #[serde(default = "GridConfig::default_divisions")]
    pub divisions: u32,

    /// Tolerance, in cell units, added to the upper cell index of a bounding box
    #[serde(default = "GridConfig::default_epsilon")]
    pub epsilon: f64,
}

impl GridConfig {
    const fn default_extent() -> BoundingBox2D {
        BoundingBox2D {
            min_x: -120.0,
            min_y: -120.0,
            max_x: 120.0,
            max_y: 120.0,
        }
    }

    const fn default_divisions() -> u32 {
        5
    }

    const fn default_epsilon() -> f64 {
        1e-9
    }

    pub fn new(extent: BoundingBox2D, divisions: u32) -> Self {
        Self {
            extent,
            divisions,
            epsilon: Self::default_epsilon(),
        }
    }

    pub fn with_divisions(mut self, divisions: u32) -> Self {
        self.divisions = divisions;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.divisions == 0 {
            return Err("Grid divisions must be greater than zero".to_string());
        }

        if !self.extent.is_finite() {
            return Err("Grid extent must be finite".to_string());
        }

        if self.extent.width() <= 0.0 || self.extent.height() <= 0.0 {
            return Err(format!(
                "Grid extent must have positive width and height, got {} x {}",
                self.extent.width(),
                self.extent.height()
            ));
        }

        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(format!(
                "Grid epsilon must be finite and non-negative, got {}",
                self.epsilon
            ));
        }

        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            extent: Self::default_extent(),
            divisions: Self::default_divisions(),
            epsilon: Self::default_epsilon(),
        }
    }
}

/// How candidate pairs with equal identifiers are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelfPairPolicy {
    /// Identity is `(role, id)`: equal ids in A and B are different features
    #[default]
    CollectionQualified,
    /// Any pair with `id_a == id_b` is dropped before evaluation
    ExcludeMatchingIds,
}

impl SelfPairPolicy {
    /// Whether a candidate with these identifiers may be evaluated.
    pub fn admits(&self, id_a: &str, id_b: &str) -> bool {
        match self {
            SelfPairPolicy::CollectionQualified => true,
            SelfPairPolicy::ExcludeMatchingIds => id_a != id_b,
        }
    }
}

/// Join configuration shared by the batch and local paths.
///
/// # Example
///
/// ```rust
/// use gridjoin::{JoinConfig, SelfPairPolicy};
///
/// let json = r#"{
///     "grid": { "divisions": 50 },
///     "self_pairs": "exclude_matching_ids",
///     "index_threshold": 256
/// }"#;
/// let config = JoinConfig::from_json(json).unwrap();
/// assert_eq!(config.grid.divisions, 50);
/// assert_eq!(config.self_pairs, SelfPairPolicy::ExcludeMatchingIds);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConfig {
    #[serde(default)]
    pub grid: GridConfig,

    /// Intersections with an area at or below this value are discarded
    #[serde(default = "JoinConfig::default_negligible_area")]
    pub negligible_area: f64,

    /// Cell size (|A| x |B|) from which the R-tree candidate generator is used
    #[serde(default = "JoinConfig::default_index_threshold")]
    pub index_threshold: usize,

    #[serde(default)]
    pub self_pairs: SelfPairPolicy,

    /// Entries per chunk when recomputing collection areas from raw text
    #[serde(default = "JoinConfig::default_area_chunk_size")]
    pub area_chunk_size: usize,

    /// Features buffered in memory before flushing to the partition store
    #[serde(default = "JoinConfig::default_partition_buffer")]
    pub partition_buffer: usize,
}

impl JoinConfig {
    const fn default_negligible_area() -> f64 {
        1e-9
    }

    const fn default_index_threshold() -> usize {
        1024
    }

    const fn default_area_chunk_size() -> usize {
        10_000
    }

    const fn default_partition_buffer() -> usize {
        512
    }

    pub fn with_grid(mut self, grid: GridConfig) -> Self {
        self.grid = grid;
        self
    }

    pub fn with_divisions(mut self, divisions: u32) -> Self {
        self.grid.divisions = divisions;
        self
    }

    pub fn with_negligible_area(mut self, area: f64) -> Self {
        self.negligible_area = area;
        self
    }

    pub fn with_index_threshold(mut self, threshold: usize) -> Self {
        self.index_threshold = threshold;
        self
    }

    pub fn with_self_pairs(mut self, policy: SelfPairPolicy) -> Self {
        self.self_pairs = policy;
        self
    }

    pub fn with_area_chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "Area chunk size must be greater than zero");
        self.area_chunk_size = chunk_size;
        self
    }

    pub fn with_partition_buffer(mut self, buffer: usize) -> Self {
        assert!(buffer > 0, "Partition buffer must be greater than zero");
        if buffer > 1_000_000 {
            log::warn!(
                "Partition buffer of {} features is very large and keeps every buffered \
                geometry text in memory until flushed",
                buffer
            );
        }
        self.partition_buffer = buffer;
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        self.grid.validate()?;

        if !self.negligible_area.is_finite() || self.negligible_area < 0.0 {
            return Err(format!(
                "Negligible area must be finite and non-negative, got {}",
                self.negligible_area
            ));
        }

        if self.area_chunk_size == 0 {
            return Err("Area chunk size must be greater than zero".to_string());
        }

        if self.partition_buffer == 0 {
            return Err("Partition buffer must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Validate and convert the message into a [`GridJoinError`].
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(GridJoinError::InvalidConfig)
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let config: JoinConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(serde_json::Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> std::result::Result<Self, toml::de::Error> {
        let config: JoinConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Load from a `.json` or (with the `toml` feature) `.toml` file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        #[cfg(feature = "toml")]
        if path.extension().is_some_and(|ext| ext == "toml") {
            return Self::from_toml(&text).map_err(|e| GridJoinError::InvalidConfig(e.to_string()));
        }

        Ok(Self::from_json(&text)?)
    }
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            negligible_area: Self::default_negligible_area(),
            index_threshold: Self::default_index_threshold(),
            self_pairs: SelfPairPolicy::default(),
            area_chunk_size: Self::default_area_chunk_size(),
            partition_buffer: Self::default_partition_buffer(),
        }
    }
}
