//! Error types for gridjoin.
//!
//! Only hard preconditions surface as errors. Per-record problems (bad
//! geometry text, failed repairs, faults inside the overlay primitive) are
//! reported as values and counted, never returned through `Result`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GridJoinError>;

#[derive(Debug, Error)]
pub enum GridJoinError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection '{collection}' was partitioned with a different grid ({detail})")]
    GridMismatch { collection: String, detail: String },

    #[error("Invalid partition format: {0}")]
    InvalidFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
