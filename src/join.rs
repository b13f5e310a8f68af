//! The two execution paths over the shared compute pipeline.
//!
//! - [`batch`]: whole collections in one run, deduplicated by a final
//!   distinct reduction.
//! - [`local`]: collections materialized once into a partition store, then
//!   queried interactively with a per-query key set.

pub mod batch;
pub mod local;

pub use batch::{BatchJoin, BatchOutput, BatchStats};
pub use local::{LocalEngine, QueryOutcome, QueryParams};
