//! Error types for request planning and execution.

use prospector_core::CollectorKind;
use thiserror::Error;

/// A request could not be turned into an execution plan.
///
/// This is the only failure that aborts a whole request; it happens before
/// any task runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// The request itself is unusable
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No collector is registered for a requested kind
    #[error("no collector registered for {kind}")]
    UnknownCollector {
        /// The requested kind
        kind: CollectorKind,
    },

    /// Requested kinds depend on each other in a loop
    #[error("circular dependency: {}", format_cycle(.cycle))]
    CircularDependency {
        /// Kinds on the cycle, first kind repeated at the end
        cycle: Vec<CollectorKind>,
    },
}

fn format_cycle(cycle: &[CollectorKind]) -> String {
    cycle
        .iter()
        .map(CollectorKind::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Task results do not line up with the requested kinds.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Two results for the same kind
    #[error("duplicate result for {kind}")]
    DuplicateResult {
        /// The kind
        kind: CollectorKind,
    },

    /// A requested kind has no result
    #[error("no result for requested kind {kind}")]
    MissingResult {
        /// The kind
        kind: CollectorKind,
    },

    /// A result for a kind that was not requested
    #[error("result for unrequested kind {kind}")]
    UnexpectedResult {
        /// The kind
        kind: CollectorKind,
    },
}

/// Errors returned by the orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Planning failed; no task ran
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    /// Results could not be aggregated
    #[error("aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),

    /// Quality schema could not be built
    #[error("quality schema error: {0}")]
    Quality(#[from] prospector_quality::QualityError),

    /// The background run task died
    #[error("run task failed: {0}")]
    Join(String),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
