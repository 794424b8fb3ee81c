//! Builds the per-request envelope from terminal task results.

use crate::error::AggregateError;
use prospector_collector::{AggregatedEnvelope, CollectorResult};
use prospector_core::{CollectorCategory, CollectorKind, Cost, RequestId, RunId, Timestamp};
use std::collections::BTreeMap;

/// Request-level facts the envelope carries alongside the results.
#[derive(Debug, Clone)]
pub struct RunMeta {
    /// Request identifier
    pub request_id: RequestId,
    /// Run identifier
    pub run_id: RunId,
    /// Requested kinds in request order
    pub requested: Vec<CollectorKind>,
    /// Budget limit of the run
    pub budget_limit: Cost,
    /// When planning started
    pub started_at: Timestamp,
}

/// Combine one terminal result per requested kind into an envelope.
///
/// Pure: the same inputs always give the same envelope.
///
/// # Errors
/// Returns error if a kind has two results, a result was not requested, or a
/// requested kind has no result.
pub fn aggregate(
    meta: RunMeta,
    results: Vec<CollectorResult>,
    completed_at: Timestamp,
) -> Result<AggregatedEnvelope, AggregateError> {
    let mut by_kind = BTreeMap::new();
    for result in results {
        let kind = result.kind;
        if !meta.requested.contains(&kind) {
            return Err(AggregateError::UnexpectedResult { kind });
        }
        if by_kind.insert(kind, result).is_some() {
            return Err(AggregateError::DuplicateResult { kind });
        }
    }
    if let Some(kind) = meta.requested.iter().find(|k| !by_kind.contains_key(k)) {
        return Err(AggregateError::MissingResult { kind: *kind });
    }

    let total_cost: Cost = by_kind.values().map(|r| r.cost).sum();

    let mut cost_by_category: BTreeMap<CollectorCategory, Cost> = BTreeMap::new();
    for result in by_kind.values() {
        *cost_by_category
            .entry(result.kind.category())
            .or_insert(Cost::ZERO) += result.cost;
    }

    let total_elapsed_ms = by_kind
        .values()
        .map(|r| r.finished_at)
        .max()
        .map_or(0, |last| last.millis_since(&meta.started_at));

    let succeeded = by_kind.values().filter(|r| r.is_success()).count();
    #[allow(clippy::cast_precision_loss)]
    let success_rate = if by_kind.is_empty() {
        0.0
    } else {
        succeeded as f64 / by_kind.len() as f64
    };

    Ok(AggregatedEnvelope {
        request_id: meta.request_id,
        run_id: meta.run_id,
        requested: meta.requested,
        results: by_kind,
        total_cost,
        cost_by_category,
        budget_limit: meta.budget_limit,
        total_elapsed_ms,
        success_rate,
        started_at: meta.started_at,
        completed_at,
    })
}
