//! # gridjoin-types
//!
//! Core data types for the gridjoin spatial join engine.
//!
//! - **Bounding boxes**: `BoundingBox2D`
//! - **Grid addressing**: `CellId`, `CellRange`, `Role`
//! - **Join output**: `IntersectionRecord`, `AggregateTotals`
//! - **Run statistics**: `PartitionStats`
//!
//! All types are serializable with Serde and built on top of the `geo` crate's
//! geometric primitives.
//!
//! ## Examples
//!
//! ```rust
//! use gridjoin_types::bbox::BoundingBox2D;
//! use gridjoin_types::stats::AggregateTotals;
//!
//! let query = BoundingBox2D::new(0.0, 0.0, 10.0, 10.0);
//! assert!(query.intersects(&BoundingBox2D::new(5.0, 5.0, 15.0, 15.0)));
//!
//! let totals = AggregateTotals::new(1.0, 1.0, 0.25, 1);
//! assert!((totals.jaccard - 0.25 / 1.75).abs() < 1e-12);
//! ```

pub mod bbox;
pub mod cell;
pub mod record;
pub mod stats;
