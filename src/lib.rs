//! Grid-based spatial join computing the global Jaccard similarity of two
//! polygon collections.
//!
//! ```rust
//! use gridjoin::{BatchJoin, JoinConfig, VecSource};
//!
//! let a = VecSource::from_pairs("a", [("1", "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))")]);
//! let b = VecSource::from_pairs("b", [("2", "POLYGON((0.5 0.5, 1.5 0.5, 1.5 1.5, 0.5 1.5, 0.5 0.5))")]);
//!
//! let output = BatchJoin::new(JoinConfig::default())?.run(&a, &b, None)?;
//! assert_eq!(output.totals.intersection_count, 1);
//! assert!((output.totals.jaccard - 0.25 / 1.75).abs() < 1e-9);
//! # Ok::<(), gridjoin::GridJoinError>(())
//! ```

pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod join;
pub mod source;
pub mod storage;

pub use builder::EngineBuilder;
pub use config::{GridConfig, JoinConfig, SelfPairPolicy};
pub use error::{GridJoinError, Result};

pub use compute::candidates::CandidateStrategy;
pub use compute::grid::Grid;
pub use compute::partition::{GridPartitioner, Partition};

pub use join::{BatchJoin, BatchOutput, BatchStats, LocalEngine, QueryOutcome, QueryParams};

pub use source::{DelimitedFileSource, FeatureSource, RawEntry, VecSource};

pub use storage::{FsPartitionStore, MemoryPartitionStore, PartitionStore, StoredFeature};

pub use gridjoin_types::bbox::BoundingBox2D;
pub use gridjoin_types::cell::{CellId, CellRange, Role};
pub use gridjoin_types::record::IntersectionRecord;
pub use gridjoin_types::stats::{AggregateTotals, PartitionStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{EngineBuilder, GridJoinError, Result};

    pub use crate::{BatchJoin, LocalEngine, QueryParams};

    pub use crate::{GridConfig, JoinConfig, SelfPairPolicy};

    pub use crate::{BoundingBox2D, CellId, Role};

    pub use crate::{AggregateTotals, IntersectionRecord};

    pub use crate::{DelimitedFileSource, FeatureSource, VecSource};
}
