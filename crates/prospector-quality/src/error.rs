//! Error types for quality schema construction.

use thiserror::Error;

/// Errors raised while building a quality schema.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QualityError {
    /// A field path has an empty segment
    #[error("invalid field path '{path}' for {kind}")]
    InvalidFieldPath {
        /// Collector kind declaring the path
        kind: String,
        /// The offending path
        path: String,
    },

    /// Reliability weight is negative or not a number
    #[error("invalid reliability weight {weight} for {kind}")]
    InvalidWeight {
        /// Collector kind
        kind: String,
        /// The offending weight
        weight: f64,
    },
}

/// Result type alias for quality operations.
pub type Result<T> = std::result::Result<T, QualityError>;
