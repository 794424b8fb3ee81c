//! Sink writing one JSON file per request.

use crate::error::Result;
use crate::sink::{ResultSink, SinkAck, StoredReport};
use async_trait::async_trait;
use prospector_collector::AggregatedEnvelope;
use prospector_core::{RequestId, Timestamp};
use prospector_quality::QualityScore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Writes `<dir>/<request_id>.json`.
///
/// The file is written under a temporary name and renamed into place, so a
/// reader never sees a partial report.
#[derive(Debug, Clone)]
pub struct JsonDirSink {
    dir: PathBuf,
}

#[derive(Serialize)]
struct ReportRef<'a> {
    envelope: &'a AggregatedEnvelope,
    score: &'a QualityScore,
}

impl JsonDirSink {
    /// Create a sink writing into `dir` (created on first store).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path the report for `request_id` is written to.
    #[must_use]
    pub fn report_path(&self, request_id: &RequestId) -> PathBuf {
        self.dir.join(format!("{request_id}.json"))
    }

    /// Read a previously stored report back.
    pub async fn load(&self, request_id: &RequestId) -> Result<StoredReport> {
        let contents = fs::read(self.report_path(request_id)).await?;
        Ok(serde_json::from_slice(&contents)?)
    }
}

#[async_trait]
impl ResultSink for JsonDirSink {
    async fn store(
        &self,
        request_id: &RequestId,
        envelope: &AggregatedEnvelope,
        score: &QualityScore,
    ) -> Result<SinkAck> {
        let json = serde_json::to_vec_pretty(&ReportRef { envelope, score })?;

        fs::create_dir_all(&self.dir).await?;
        let path = self.report_path(request_id);
        let tmp = self.dir.join(format!(".{request_id}.json.tmp"));
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &path).await?;

        info!(
            request_id = %request_id,
            path = %path.display(),
            bytes = json.len(),
            "stored report"
        );

        Ok(SinkAck {
            location: path.display().to_string(),
            stored_at: Timestamp::now(),
        })
    }

    fn name(&self) -> &str {
        "json-dir"
    }
}
