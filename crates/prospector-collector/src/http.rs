//! Generic HTTP collector adapter.
//!
//! Posts the built input to the definition's endpoint and maps the HTTP
//! outcome onto the collector error taxonomy. Provider-specific extraction
//! happens behind the endpoint.

use crate::collector::{CallContext, CallFailure, CallOutput, CallResult, Collector};
use crate::definition::CollectorDefinition;
use crate::error::{CollectorError, DefinitionError, Result};
use crate::input::CollectorInput;
use async_trait::async_trait;
use prospector_core::Cost;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Header a provider uses to report the cost of a failed attempt.
pub const CHARGED_HEADER: &str = "x-charged-usd";

/// Build an HTTP client with the given overall timeout.
///
/// # Errors
/// Returns error if the HTTP client cannot be created.
pub fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DefinitionError::HttpClient(e.to_string()))
}

/// Collector that calls a JSON-over-HTTP endpoint.
pub struct HttpCollector {
    definition: CollectorDefinition,
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpCollector {
    /// Create an adapter for a definition with an `endpoint`.
    ///
    /// The bearer token is read from the environment variable named by
    /// `token_env`, when set.
    ///
    /// # Errors
    /// Returns error if the definition has no endpoint or the HTTP client
    /// cannot be created.
    pub fn new(definition: CollectorDefinition) -> Result<Self> {
        let endpoint = definition
            .collector
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| DefinitionError::ValidationError {
                kind: definition.kind().to_string(),
                reason: "HTTP collector requires collector.endpoint".to_string(),
            })?;

        let client = build_http_client(definition.retry.call_timeout_secs)?;
        let token = definition
            .collector
            .token_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|t| !t.is_empty());

        Ok(Self {
            definition,
            client,
            endpoint,
            token,
        })
    }

    /// Override the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    request_id: &'a str,
    attempt: u32,
    input: &'a serde_json::Value,
    max_charge_usd: f64,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    items: serde_json::Value,
    #[serde(default)]
    cost_usd: f64,
}

#[async_trait]
impl Collector for HttpCollector {
    fn definition(&self) -> &CollectorDefinition {
        &self.definition
    }

    async fn call(&self, input: &CollectorInput, ctx: &CallContext) -> CallResult {
        let body = CallRequest {
            request_id: ctx.request_id.as_str(),
            attempt: ctx.attempt,
            input: &input.params,
            max_charge_usd: ctx.max_charge.as_usd(),
        };

        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(ctx.remaining().min(self.definition.retry.call_timeout()))
            .json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| CallFailure::free(map_transport_error(&e, started)))?;

        let status = response.status();
        if !status.is_success() {
            let charged = charged_cost(response.headers());
            let retry_after = retry_after(response.headers());
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            debug!(
                kind = %ctx.kind,
                status = status.as_u16(),
                attempt = ctx.attempt,
                "collector endpoint returned error status"
            );
            return Err(CallFailure {
                error: classify_status(status, retry_after, message),
                cost: charged,
            });
        }

        let charged = charged_cost(response.headers());
        let parsed: CallResponse = response.json().await.map_err(|e| CallFailure {
            error: CollectorError::MalformedResponse(e.to_string()),
            cost: charged,
        })?;

        Ok(CallOutput {
            payload: parsed.items,
            cost: Cost::from_usd(parsed.cost_usd),
        })
    }
}

/// Map a non-success HTTP status onto the collector error taxonomy.
#[must_use]
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    message: String,
) -> CollectorError {
    match status.as_u16() {
        400 | 422 => CollectorError::InvalidInput(message),
        401 | 403 => CollectorError::Authentication(message),
        404 | 410 => CollectorError::InvalidTarget(message),
        408 | 504 => CollectorError::Timeout { elapsed_ms: 0 },
        429 => CollectorError::RateLimited { retry_after },
        code if status.is_server_error() => CollectorError::ProviderUnavailable { status: code },
        code => CollectorError::Rejected {
            status: code,
            message,
        },
    }
}

fn map_transport_error(error: &reqwest::Error, started: Instant) -> CollectorError {
    if error.is_timeout() {
        CollectorError::Timeout {
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    } else {
        CollectorError::Network(error.to_string())
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn charged_cost(headers: &HeaderMap) -> Cost {
    headers
        .get(CHARGED_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map_or(Cost::ZERO, Cost::from_usd)
}
