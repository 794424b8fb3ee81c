//! Error types for result sinks.

use thiserror::Error;

/// Errors raised while storing a report.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The report could not be serialized
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sink refused the report
    #[error("sink '{sink}' rejected report: {reason}")]
    Rejected {
        /// Sink name
        sink: String,
        /// Why
        reason: String,
    },
}

/// Result type alias for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SinkError::Rejected {
            sink: "memory".to_string(),
            reason: "closed".to_string(),
        };
        assert_eq!(err.to_string(), "sink 'memory' rejected report: closed");
    }
}
