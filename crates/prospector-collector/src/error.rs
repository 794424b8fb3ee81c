//! Error types for the collector subsystem.
//!
//! Two families live here: [`DefinitionError`] for loading and registering
//! collector definitions, and [`CollectorError`] for the outcome of a single
//! collector call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while loading, validating or registering definitions.
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// Collector definition not found
    #[error("collector definition not found: {kind}")]
    NotFound {
        /// The kind that was not found
        kind: String,
    },

    /// Failed to load a definition file
    #[error("failed to load collector definition from {path}: {source}")]
    LoadError {
        /// Path to the definition file
        path: String,
        /// Underlying error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse definition TOML
    #[error("failed to parse collector definition TOML in {path}: {source}")]
    ParseError {
        /// Path to the definition file
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// Invalid collector definition (validation failed)
    #[error("invalid collector definition for {kind}: {reason}")]
    ValidationError {
        /// Kind being validated
        kind: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Two collectors registered for the same kind
    #[error("collector already registered for {kind}")]
    DuplicateKind {
        /// The duplicated kind
        kind: String,
    },

    /// Definitions directory not found
    #[error("collector definitions directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// HTTP client construction failed
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// I/O error while accessing definitions
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for definition and registry operations.
pub type Result<T> = std::result::Result<T, DefinitionError>;

/// How a call failure should be treated by the retry executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Malformed task input; never retried
    Input,
    /// Timeout, rate limit, network or 5xx-equivalent; retried
    Transient,
    /// Authentication or permanently invalid target; never retried
    Permanent,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "input error",
            Self::Transient => "transient provider error",
            Self::Permanent => "permanent provider error",
        };
        f.write_str(name)
    }
}

/// Failure of one collector call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    /// Task input could not be built or was refused as malformed
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The call did not complete within its per-attempt timeout
    #[error("call timed out after {elapsed_ms}ms")]
    Timeout {
        /// How long the attempt ran
        elapsed_ms: u64,
    },

    /// Provider-side rate limit
    #[error("rate limited by provider")]
    RateLimited {
        /// Delay requested by the provider, if any
        retry_after: Option<Duration>,
    },

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Provider answered with a server-side error
    #[error("provider unavailable: status {status}")]
    ProviderUnavailable {
        /// HTTP-equivalent status code
        status: u16,
    },

    /// Credentials were refused
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The target does not exist or can never be collected
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// Provider refused the request for another permanent reason
    #[error("request rejected: status {status}, {message}")]
    Rejected {
        /// HTTP-equivalent status code
        status: u16,
        /// Provider message
        message: String,
    },

    /// Provider answered but the body could not be understood
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CollectorError {
    /// Failure class used for retry decisions and reporting.
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::InvalidInput(_) => FailureClass::Input,
            Self::Timeout { .. }
            | Self::RateLimited { .. }
            | Self::Network(_)
            | Self::ProviderUnavailable { .. } => FailureClass::Transient,
            Self::Authentication(_)
            | Self::InvalidTarget(_)
            | Self::Rejected { .. }
            | Self::MalformedResponse(_) => FailureClass::Permanent,
        }
    }

    /// Whether the default classifier retries this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() == FailureClass::Transient
    }

    /// Provider-requested delay before the next attempt.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
