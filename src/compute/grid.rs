//! Uniform grid over a fixed global extent.
//!
//! A bounding box is assigned to the full rectangular block of cells it
//! overlaps, not just the cell of its minimum corner. Two boxes that overlap
//! therefore always share at least one cell.
//!
//! Cell indices are a pure function of the box and the [`GridConfig`]:
//!
//! ```text
//! start = clamp(floor((lo - min) / size), 0, N-1)
//! end   = clamp(floor((hi - min) / size + epsilon), 0, N-1)
//! ```
//!
//! The epsilon is applied to the upper bound only, so a box whose maximum
//! lands on a cell boundary (up to rounding) deterministically includes the
//! cell on the far side of that boundary.

use crate::config::GridConfig;
use crate::error::{GridJoinError, Result};
use gridjoin_types::bbox::BoundingBox2D;
use gridjoin_types::cell::{CellId, CellRange};

#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    config: GridConfig,
    cell_width: f64,
    cell_height: f64,
}

impl Grid {
    /// Build a grid from a validated configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridjoin::{BoundingBox2D, Grid, GridConfig};
    ///
    /// let grid = Grid::new(GridConfig::new(BoundingBox2D::new(0.0, 0.0, 10.0, 10.0), 10)).unwrap();
    /// let range = grid.cell_range(&BoundingBox2D::new(1.5, 1.5, 2.5, 2.5));
    /// assert_eq!(range.len(), 4);
    /// ```
    pub fn new(config: GridConfig) -> Result<Self> {
        config.validate().map_err(GridJoinError::InvalidConfig)?;

        let n = config.divisions as f64;
        let cell_width = config.extent.width() / n;
        let cell_height = config.extent.height() / n;

        Ok(Self {
            config,
            cell_width,
            cell_height,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn divisions(&self) -> u32 {
        self.config.divisions
    }

    pub fn cell_width(&self) -> f64 {
        self.cell_width
    }

    pub fn cell_height(&self) -> f64 {
        self.cell_height
    }

    pub fn cell_count(&self) -> usize {
        let n = self.config.divisions as usize;
        n * n
    }

    /// Block of cells overlapped by `bbox`, clamped to the grid.
    pub fn cell_range(&self, bbox: &BoundingBox2D) -> CellRange {
        let extent = &self.config.extent;
        let eps = self.config.epsilon;

        let start_col = self.clamp_index(((bbox.min_x - extent.min_x) / self.cell_width).floor());
        let end_col =
            self.clamp_index(((bbox.max_x - extent.min_x) / self.cell_width + eps).floor());
        let start_row =
            self.clamp_index(((bbox.min_y - extent.min_y) / self.cell_height).floor());
        let end_row =
            self.clamp_index(((bbox.max_y - extent.min_y) / self.cell_height + eps).floor());

        CellRange {
            start_row,
            end_row: end_row.max(start_row),
            start_col,
            end_col: end_col.max(start_col),
        }
    }

    /// Every cell overlapped by `bbox`, in row-major order.
    pub fn cells_for(&self, bbox: &BoundingBox2D) -> impl Iterator<Item = CellId> + use<> {
        self.cell_range(bbox).iter()
    }

    /// Spatial extent of one cell.
    pub fn cell_extent(&self, cell: CellId) -> BoundingBox2D {
        let extent = &self.config.extent;
        let min_x = extent.min_x + cell.col as f64 * self.cell_width;
        let min_y = extent.min_y + cell.row as f64 * self.cell_height;
        BoundingBox2D::new(
            min_x,
            min_y,
            min_x + self.cell_width,
            min_y + self.cell_height,
        )
    }

    fn clamp_index(&self, value: f64) -> u32 {
        let max = (self.config.divisions - 1) as f64;
        // NaN clamps to the first cell
        if value.is_nan() {
            return 0;
        }
        value.clamp(0.0, max) as u32
    }
}
