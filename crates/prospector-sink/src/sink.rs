//! The result sink contract.

use crate::error::Result;
use async_trait::async_trait;
use prospector_collector::AggregatedEnvelope;
use prospector_core::{RequestId, Timestamp};
use prospector_quality::QualityScore;
use serde::{Deserialize, Serialize};

/// Acknowledgement of a stored report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkAck {
    /// Sink-specific location of the stored report
    pub location: String,
    /// When the report was stored
    pub stored_at: Timestamp,
}

/// A finished report as handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReport {
    /// Aggregated results
    pub envelope: AggregatedEnvelope,
    /// Quality score of the envelope
    pub score: QualityScore,
}

/// Destination for finished reports.
///
/// Storage is acknowledged but never unwinds a computed envelope: callers
/// report a failed `store` and keep the envelope.
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Store the report for `request_id`.
    ///
    /// # Errors
    /// Returns error if the report cannot be serialized or written.
    async fn store(
        &self,
        request_id: &RequestId,
        envelope: &AggregatedEnvelope,
        score: &QualityScore,
    ) -> Result<SinkAck>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
