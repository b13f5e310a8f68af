//! Engine builder for the local path.
//!
//! Picks the partition store (directory-backed or in-memory) and the join
//! configuration, then validates both before handing out a [`LocalEngine`].

use crate::config::JoinConfig;
use crate::error::Result;
use crate::join::LocalEngine;
use crate::storage::{FsPartitionStore, MemoryPartitionStore, PartitionStore};
use std::path::PathBuf;

/// Builder for a [`LocalEngine`].
#[derive(Debug)]
pub struct EngineBuilder {
    store_path: Option<PathBuf>,
    config: JoinConfig,
}

impl EngineBuilder {
    /// Create a new builder with the default configuration and an in-memory store.
    pub fn new() -> Self {
        Self {
            store_path: None,
            config: JoinConfig::default(),
        }
    }

    /// Persist partitions under `path`. The directory is created if needed.
    pub fn store_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Keep partitions in memory for the lifetime of the engine.
    pub fn in_memory(mut self) -> Self {
        self.store_path = None;
        self
    }

    pub fn config(mut self, config: JoinConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine. Fails on an invalid configuration or an unusable
    /// store directory.
    pub fn build(self) -> Result<LocalEngine> {
        self.config.check()?;

        let store: Box<dyn PartitionStore> = match self.store_path {
            Some(path) => Box::new(FsPartitionStore::open(path)?),
            None => Box::new(MemoryPartitionStore::new()),
        };

        LocalEngine::new(store, self.config)
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::error::GridJoinError;
    use crate::source::VecSource;
    use tempfile::TempDir;

    #[test]
    fn test_builder_default() {
        let builder = EngineBuilder::new();
        assert!(builder.store_path.is_none());
        assert_eq!(builder.config, JoinConfig::default());
    }

    #[test]
    fn test_builder_in_memory() {
        let engine = EngineBuilder::new().in_memory().build().unwrap();
        let source = VecSource::from_pairs("a", [("1", "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))")]);
        engine.materialize("a", &source).unwrap();
        assert_eq!(engine.collections().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_builder_store_path_persists() {
        let dir = TempDir::new().unwrap();
        let source = VecSource::from_pairs("a", [("1", "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))")]);

        let engine = EngineBuilder::new().store_path(dir.path()).build().unwrap();
        engine.materialize("parcels", &source).unwrap();
        drop(engine);

        let reopened = EngineBuilder::new().store_path(dir.path()).build().unwrap();
        assert_eq!(reopened.collections().unwrap(), vec!["parcels"]);
        assert!(!reopened.cells("parcels").unwrap().is_empty());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = JoinConfig::default().with_grid(GridConfig::default().with_divisions(0));
        let result = EngineBuilder::new().config(config).build();
        assert!(matches!(result, Err(GridJoinError::InvalidConfig(_))));
    }
}
