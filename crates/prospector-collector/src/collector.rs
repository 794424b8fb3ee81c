//! The collector call contract.

use crate::definition::CollectorDefinition;
use crate::error::CollectorError;
use crate::input::{CollectorInput, Subject};
use async_trait::async_trait;
use prospector_core::{CollectorKind, Cost, RequestId, RunId};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Trait for external data-source integrations.
///
/// Implementations must be thread-safe (Send + Sync); one instance serves
/// every concurrent request for its kind. The static parts of the contract
/// (input construction, cost estimation, retry classification) default to
/// the collector's [`CollectorDefinition`].
#[async_trait]
pub trait Collector: Send + Sync {
    /// Static declaration for this collector.
    fn definition(&self) -> &CollectorDefinition;

    /// Kind this collector serves.
    fn kind(&self) -> CollectorKind {
        self.definition().kind()
    }

    /// Build the call input from the subject and, for dependent collectors,
    /// the dependency's payload.
    fn build_input(
        &self,
        subject: &Subject,
        upstream: Option<&Value>,
    ) -> Result<CollectorInput, CollectorError> {
        self.definition().input.build(self.kind(), subject, upstream)
    }

    /// Smaller version of `input` carrying at most `max_items` lookup
    /// values, or `None` if it cannot be trimmed that far.
    fn shrink_input(&self, input: &CollectorInput, max_items: usize) -> Option<CollectorInput> {
        self.definition().input.limit(input, max_items)
    }

    /// Estimated cost of calling with `input`, used for the budget reservation.
    fn estimate_cost(&self, input: &CollectorInput) -> Cost {
        self.definition().cost.estimate(input.units())
    }

    /// Whether a failed attempt may be retried.
    fn is_retryable(&self, error: &CollectorError) -> bool {
        error.is_retryable()
    }

    /// Perform one call attempt.
    ///
    /// The attempt must stop charging once `ctx.max_charge` is reached and
    /// should return promptly when `ctx.cancel` fires. A failure still
    /// reports any cost the provider charged for the attempt.
    async fn call(&self, input: &CollectorInput, ctx: &CallContext) -> CallResult;
}

/// Per-attempt call context.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Request being served
    pub request_id: RequestId,
    /// Run executing the request
    pub run_id: RunId,
    /// Kind being called
    pub kind: CollectorKind,
    /// 1-based attempt number
    pub attempt: u32,
    /// Absolute deadline of the whole request
    pub deadline: Instant,
    /// Reservation ceiling the provider must not exceed
    pub max_charge: Cost,
    /// Fires on request deadline or abort
    pub cancel: CancellationToken,
}

impl CallContext {
    /// Time left until the request deadline.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Successful call output.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutput {
    /// Raw provider payload
    pub payload: Value,
    /// Cost the provider charged
    pub cost: Cost,
}

/// Failed call, with whatever the attempt cost.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFailure {
    /// What went wrong
    pub error: CollectorError,
    /// Cost the provider charged for the failed attempt
    pub cost: Cost,
}

impl CallFailure {
    /// Failure that cost nothing.
    #[must_use]
    pub fn free(error: CollectorError) -> Self {
        Self {
            error,
            cost: Cost::ZERO,
        }
    }
}

impl From<CollectorError> for CallFailure {
    fn from(error: CollectorError) -> Self {
        Self::free(error)
    }
}

/// Result of one call attempt.
pub type CallResult = Result<CallOutput, CallFailure>;
