//! Partition store abstraction for the local path.
//!
//! A store maps a collection name to its per-cell feature groups, plus the
//! grid the collection was partitioned with. Groups hold the raw geometry
//! text of accepted features; the local engine re-prepares them on load.
//!
//! Rebuilding a collection clears it first. Callers must not query a
//! collection while it is being rebuilt.

use crate::config::GridConfig;
use crate::error::{GridJoinError, Result};
use gridjoin_types::cell::CellId;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub mod fs;
pub mod records;

pub use fs::FsPartitionStore;

/// One feature as persisted in a cell group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFeature {
    pub id: String,
    pub geometry: String,
}

impl StoredFeature {
    pub fn new(id: impl Into<String>, geometry: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            geometry: geometry.into(),
        }
    }
}

/// Durable mapping from collection name to cell to feature group.
///
/// Implementations use interior mutability so a store can be shared
/// behind `&self` by concurrent readers.
pub trait PartitionStore: Send + Sync {
    /// Clear the collection and record the grid it is partitioned with
    fn init(&self, collection: &str, grid: &GridConfig) -> Result<()>;

    /// Append features to one cell group of an initialised collection
    fn append(&self, collection: &str, cell: CellId, features: &[StoredFeature]) -> Result<()>;

    /// Cells holding at least one feature
    fn cells(&self, collection: &str) -> Result<BTreeSet<CellId>>;

    /// Features of one cell, in append order. Unknown cells are empty.
    fn load(&self, collection: &str, cell: CellId) -> Result<Vec<StoredFeature>>;

    fn grid_config(&self, collection: &str) -> Result<GridConfig>;

    fn contains(&self, collection: &str) -> Result<bool>;

    /// Names of initialised collections, sorted
    fn collections(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
struct MemoryCollection {
    grid: GridConfig,
    cells: BTreeMap<CellId, Vec<StoredFeature>>,
}

/// In-memory partition store.
#[derive(Debug, Default)]
pub struct MemoryPartitionStore {
    collections: RwLock<FxHashMap<String, MemoryCollection>>,
}

impl MemoryPartitionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PartitionStore for MemoryPartitionStore {
    fn init(&self, collection: &str, grid: &GridConfig) -> Result<()> {
        self.collections.write().insert(
            collection.to_string(),
            MemoryCollection {
                grid: grid.clone(),
                cells: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn append(&self, collection: &str, cell: CellId, features: &[StoredFeature]) -> Result<()> {
        let mut collections = self.collections.write();
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| GridJoinError::CollectionNotFound(collection.to_string()))?;
        entry
            .cells
            .entry(cell)
            .or_default()
            .extend_from_slice(features);
        Ok(())
    }

    fn cells(&self, collection: &str) -> Result<BTreeSet<CellId>> {
        let collections = self.collections.read();
        let entry = collections
            .get(collection)
            .ok_or_else(|| GridJoinError::CollectionNotFound(collection.to_string()))?;
        Ok(entry
            .cells
            .iter()
            .filter(|(_, features)| !features.is_empty())
            .map(|(cell, _)| *cell)
            .collect())
    }

    fn load(&self, collection: &str, cell: CellId) -> Result<Vec<StoredFeature>> {
        let collections = self.collections.read();
        let entry = collections
            .get(collection)
            .ok_or_else(|| GridJoinError::CollectionNotFound(collection.to_string()))?;
        Ok(entry.cells.get(&cell).cloned().unwrap_or_default())
    }

    fn grid_config(&self, collection: &str) -> Result<GridConfig> {
        self.collections
            .read()
            .get(collection)
            .map(|entry| entry.grid.clone())
            .ok_or_else(|| GridJoinError::CollectionNotFound(collection.to_string()))
    }

    fn contains(&self, collection: &str) -> Result<bool> {
        Ok(self.collections.read().contains_key(collection))
    }

    fn collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
