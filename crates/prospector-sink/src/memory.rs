//! In-memory sink.

use crate::error::{Result, SinkError};
use crate::sink::{ResultSink, SinkAck, StoredReport};
use async_trait::async_trait;
use prospector_collector::AggregatedEnvelope;
use prospector_core::{RequestId, Timestamp};
use prospector_quality::QualityScore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Keeps reports in a map keyed by request.
///
/// A later report for the same request replaces the earlier one.
#[derive(Debug, Default)]
pub struct MemorySink {
    reports: RwLock<HashMap<RequestId, StoredReport>>,
    rejecting: AtomicBool,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `store` calls fail (or succeed again).
    pub fn set_rejecting(&self, rejecting: bool) {
        self.rejecting.store(rejecting, Ordering::SeqCst);
    }

    /// Stored report for `request_id`.
    #[must_use]
    pub fn get(&self, request_id: &RequestId) -> Option<StoredReport> {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_id)
            .cloned()
    }

    /// Number of stored reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn store(
        &self,
        request_id: &RequestId,
        envelope: &AggregatedEnvelope,
        score: &QualityScore,
    ) -> Result<SinkAck> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected {
                sink: self.name().to_string(),
                reason: "sink is rejecting writes".to_string(),
            });
        }

        self.reports
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                request_id.clone(),
                StoredReport {
                    envelope: envelope.clone(),
                    score: score.clone(),
                },
            );
        debug!(request_id = %request_id, "stored report in memory");

        Ok(SinkAck {
            location: format!("memory://{request_id}"),
            stored_at: Timestamp::now(),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}
