//! The request shape accepted by the orchestrator.

use prospector_collector::Subject;
use prospector_core::{CollectorKind, Cost, RequestId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One logical prospect request.
///
/// `budget_usd` and `timeout_secs` fall back to the orchestrator defaults
/// when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Request identifier (generated when absent)
    #[serde(default = "RequestId::generate")]
    pub request_id: RequestId,
    /// Who or what to collect data about
    pub subject: Subject,
    /// Collector kinds to run, in request order
    pub kinds: Vec<CollectorKind>,
    /// Spend limit for the whole request
    #[serde(default, rename = "budget_usd", skip_serializing_if = "Option::is_none")]
    pub budget: Option<Cost>,
    /// Global deadline, in seconds from the start of execution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Request {
    /// Create a request with a fresh identifier and default limits.
    #[must_use]
    pub fn new(subject: Subject, kinds: Vec<CollectorKind>) -> Self {
        Self {
            request_id: RequestId::generate(),
            subject,
            kinds,
            budget: None,
            timeout_secs: None,
        }
    }

    /// Use a caller-chosen identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Set the spend limit.
    #[must_use]
    pub fn with_budget(mut self, budget: Cost) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Set the global deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Global deadline, if set.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
