//! The aggregated per-request envelope.

use crate::result::{CollectorResult, ResultStatus};
use prospector_core::{CollectorCategory, CollectorKind, Cost, RequestId, RunId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// All task results of one request, keyed by collector kind.
///
/// Every requested kind has exactly one entry; kinds without data carry an
/// explicit non-success status instead of being omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEnvelope {
    /// Request identifier
    pub request_id: RequestId,
    /// Run that produced the envelope
    pub run_id: RunId,
    /// Kinds the request asked for, in request order
    pub requested: Vec<CollectorKind>,
    /// One result per requested kind
    pub results: BTreeMap<CollectorKind, CollectorResult>,
    /// Sum of recorded spend across all tasks
    pub total_cost: Cost,
    /// Spend grouped by data category
    pub cost_by_category: BTreeMap<CollectorCategory, Cost>,
    /// Budget limit the request ran under
    pub budget_limit: Cost,
    /// Latest task finish minus plan start
    pub total_elapsed_ms: u64,
    /// Share of requested kinds that succeeded
    pub success_rate: f64,
    /// When planning started
    pub started_at: Timestamp,
    /// When the envelope was built
    pub completed_at: Timestamp,
}

/// A requested kind without data, with its reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingKind {
    /// The kind
    pub kind: CollectorKind,
    /// `failed`, `skipped` or `cancelled`
    pub status: String,
    /// Human-readable reason
    pub reason: String,
}

impl AggregatedEnvelope {
    /// Result for one kind, if it was requested.
    #[must_use]
    pub fn get(&self, kind: CollectorKind) -> Option<&CollectorResult> {
        self.results.get(&kind)
    }

    /// Payload for one kind, if it succeeded.
    #[must_use]
    pub fn payload(&self, kind: CollectorKind) -> Option<&Value> {
        self.results.get(&kind).and_then(|r| r.payload.as_ref())
    }

    /// Whether `kind` was part of the request.
    #[must_use]
    pub fn is_requested(&self, kind: CollectorKind) -> bool {
        self.requested.contains(&kind)
    }

    /// Successful results.
    pub fn succeeded(&self) -> impl Iterator<Item = &CollectorResult> {
        self.results.values().filter(|r| r.is_success())
    }

    /// Requested kinds without data, in request order.
    #[must_use]
    pub fn missing(&self) -> Vec<MissingKind> {
        self.requested
            .iter()
            .filter_map(|kind| {
                let result = self.results.get(kind)?;
                if matches!(result.status, ResultStatus::Succeeded) {
                    return None;
                }
                Some(MissingKind {
                    kind: *kind,
                    status: result.status.label().to_string(),
                    reason: result.status.reason().unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Whether every requested kind succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.requested
            .iter()
            .all(|kind| self.results.get(kind).is_some_and(CollectorResult::is_success))
    }
}
