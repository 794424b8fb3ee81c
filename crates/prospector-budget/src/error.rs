//! Error types for the budget ledger.

use thiserror::Error;

/// Errors returned by ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BudgetError {
    /// The reservation is not open on this ledger
    #[error("reservation {reservation} is not open on the ledger for request {request_id}")]
    UnknownReservation {
        /// Reservation identifier
        reservation: u64,
        /// Request the ledger belongs to
        request_id: String,
    },
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, BudgetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BudgetError::UnknownReservation {
            reservation: 7,
            request_id: "550e8400-e29b-41d4-a716-446655440000".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "reservation 7 is not open on the ledger for request 550e8400-e29b-41d4-a716-446655440000"
        );
    }
}
