//! Per-task collector results.

use crate::error::{CollectorError, FailureClass};
use prospector_core::{CollectorKind, Cost, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Why a task never called its collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipReason {
    /// The ledger denied the reservation
    BudgetExhausted {
        /// Estimated cost the task asked to reserve
        requested: Cost,
        /// Budget left at the time of the denial
        remaining: Cost,
    },
    /// The task's dependency did not succeed or was not requested
    DependencyUnavailable {
        /// The dependency kind
        dependency: CollectorKind,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetExhausted {
                requested,
                remaining,
            } => write!(
                f,
                "budget exhausted: needed {requested}, {remaining} remaining"
            ),
            Self::DependencyUnavailable { dependency } => {
                write!(f, "dependency {dependency} unavailable")
            }
        }
    }
}

/// Why a task was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// The request's global deadline elapsed
    Deadline,
    /// The request was aborted by its caller
    Aborted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deadline => f.write_str("deadline exceeded"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Terminal status of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResultStatus {
    /// The collector returned data
    Succeeded,
    /// The collector call failed
    Failed {
        /// Failure class of the last error
        class: FailureClass,
        /// Last error message
        error: String,
    },
    /// The collector was never called
    Skipped {
        /// Why
        reason: SkipReason,
    },
    /// The task was cancelled before finishing
    Cancelled {
        /// Why
        reason: CancelReason,
    },
}

impl ResultStatus {
    /// Whether this is `Succeeded`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// Short machine label (`succeeded`, `failed`, `skipped`, `cancelled`).
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    /// Human-readable reason for any non-success status.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Succeeded => None,
            Self::Failed { class, error } => Some(format!("{class}: {error}")),
            Self::Skipped { reason } => Some(reason.to_string()),
            Self::Cancelled { reason } => Some(reason.to_string()),
        }
    }
}

/// Spend and timing accumulated by a task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskUsage {
    /// Cost recorded against the ledger
    pub cost: Cost,
    /// Provider charges that could not be recorded within the budget
    pub overrun: Cost,
    /// Call attempts made
    pub attempts: u32,
    /// When the first attempt started
    pub started_at: Option<Timestamp>,
    /// When the task reached its terminal state
    pub finished_at: Timestamp,
}

impl TaskUsage {
    /// Usage of a task that never ran.
    #[must_use]
    pub fn none(at: Timestamp) -> Self {
        Self {
            cost: Cost::ZERO,
            overrun: Cost::ZERO,
            attempts: 0,
            started_at: None,
            finished_at: at,
        }
    }
}

/// Terminal outcome of one task, immutable once built.
///
/// `payload` is present exactly when `status` is `Succeeded`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorResult {
    /// Collector kind
    pub kind: CollectorKind,
    /// Terminal status
    #[serde(flatten)]
    pub status: ResultStatus,
    /// Raw provider payload
    pub payload: Option<Value>,
    /// Spend recorded for this task
    pub cost: Cost,
    /// Charges beyond the budget that were not recorded
    #[serde(default, skip_serializing_if = "is_zero")]
    pub overrun: Cost,
    /// Call attempts made
    pub attempts: u32,
    /// When the first attempt started
    pub started_at: Option<Timestamp>,
    /// When the task became terminal
    pub finished_at: Timestamp,
    /// Wall time between start and finish
    pub elapsed_ms: u64,
}

fn is_zero(cost: &Cost) -> bool {
    cost.is_zero()
}

impl CollectorResult {
    fn build(
        kind: CollectorKind,
        status: ResultStatus,
        payload: Option<Value>,
        usage: TaskUsage,
    ) -> Self {
        let elapsed_ms = usage
            .started_at
            .map_or(0, |start| usage.finished_at.millis_since(&start));
        Self {
            kind,
            status,
            payload,
            cost: usage.cost,
            overrun: usage.overrun,
            attempts: usage.attempts,
            started_at: usage.started_at,
            finished_at: usage.finished_at,
            elapsed_ms,
        }
    }

    /// Successful result carrying the provider payload.
    #[must_use]
    pub fn succeeded(kind: CollectorKind, payload: Value, usage: TaskUsage) -> Self {
        Self::build(kind, ResultStatus::Succeeded, Some(payload), usage)
    }

    /// Failed result built from the last error.
    #[must_use]
    pub fn failed(kind: CollectorKind, error: &CollectorError, usage: TaskUsage) -> Self {
        let status = ResultStatus::Failed {
            class: error.class(),
            error: error.to_string(),
        };
        Self::build(kind, status, None, usage)
    }

    /// Skipped result; the collector was never called.
    #[must_use]
    pub fn skipped(kind: CollectorKind, reason: SkipReason, at: Timestamp) -> Self {
        Self::build(
            kind,
            ResultStatus::Skipped { reason },
            None,
            TaskUsage::none(at),
        )
    }

    /// Cancelled result.
    #[must_use]
    pub fn cancelled(kind: CollectorKind, reason: CancelReason, usage: TaskUsage) -> Self {
        Self::build(kind, ResultStatus::Cancelled { reason }, None, usage)
    }

    /// Whether the task succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usage(attempts: u32) -> TaskUsage {
        let start = Timestamp::from_rfc3339("2025-01-01T10:00:00Z").expect("parse");
        let end = Timestamp::from_rfc3339("2025-01-01T10:00:02.5Z").expect("parse");
        TaskUsage {
            cost: Cost::from_usd(0.01),
            overrun: Cost::ZERO,
            attempts,
            started_at: Some(start),
            finished_at: end,
        }
    }

    #[test]
    fn test_succeeded_carries_payload_and_timing() {
        let result =
            CollectorResult::succeeded(CollectorKind::Zoominfo, json!({"company": {}}), usage(2));
        assert!(result.is_success());
        assert!(result.payload.is_some());
        assert_eq!(result.attempts, 2);
        assert_eq!(result.elapsed_ms, 2_500);
        assert_eq!(result.status.reason(), None);
    }

    #[test]
    fn test_failed_records_class() {
        let err = CollectorError::Authentication("token revoked".to_string());
        let result = CollectorResult::failed(CollectorKind::Crunchbase, &err, usage(1));
        assert!(result.payload.is_none());
        assert_eq!(
            result.status,
            ResultStatus::Failed {
                class: FailureClass::Permanent,
                error: "authentication failed: token revoked".to_string(),
            }
        );
        assert_eq!(
            result.status.reason().as_deref(),
            Some("permanent provider error: authentication failed: token revoked")
        );
    }

    #[test]
    fn test_skipped_has_no_usage() {
        let result = CollectorResult::skipped(
            CollectorKind::FacebookPosts,
            SkipReason::BudgetExhausted {
                requested: Cost::from_usd(35.5),
                remaining: Cost::from_usd(5.0),
            },
            Timestamp::now(),
        );
        assert_eq!(result.attempts, 0);
        assert_eq!(result.cost, Cost::ZERO);
        assert_eq!(result.elapsed_ms, 0);
        assert_eq!(result.status.label(), "skipped");
    }

    #[test]
    fn test_serialized_shape() {
        let result = CollectorResult::cancelled(
            CollectorKind::TwitterProfile,
            CancelReason::Deadline,
            usage(1),
        );
        let json = serde_json::to_value(&result).expect("serialize result");
        assert_eq!(json["kind"], "twitter_profile");
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["reason"], "deadline");
        assert_eq!(json["payload"], Value::Null);
        assert!(json.get("overrun").is_none());

        let back: CollectorResult = serde_json::from_value(json).expect("deserialize result");
        assert_eq!(back.status, result.status);
    }
}
