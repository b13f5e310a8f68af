//! Compute layer: the grid join pipeline.
//!
//! This module separates the join algorithms from storage and sources.
//! Stages, in pipeline order:
//! - [`geometry`] and [`feature`]: parsing, repair and measurement
//! - [`grid`] and [`partition`]: cell assignment with full replication
//! - [`candidates`]: per-cell candidate pairs, exhaustive or R-tree backed
//! - [`evaluate`]: exact intersection areas
//! - [`dedup`]: one record per `(id_a, id_b)` across cells
//! - [`aggregate`]: totals and the Jaccard ratio
//!
//! [`geojson`] exports features for display.

pub mod aggregate;
pub mod candidates;
pub mod dedup;
pub mod evaluate;
pub mod feature;
pub mod geojson;
pub mod geometry;
pub mod grid;
pub mod partition;
