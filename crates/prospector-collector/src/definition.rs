//! Collector definition types.
//!
//! A definition is the static declaration every collector kind carries:
//! pricing, retry policy, dependency, expected output fields and the input
//! mapping. Definitions are loaded from TOML files.

use crate::error::{DefinitionError, Result};
use crate::input::InputMapping;
use prospector_core::{CollectorCategory, CollectorKind, CollectorOverride, Cost};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete collector definition loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorDefinition {
    /// Core collector metadata
    pub collector: CollectorMetadata,

    /// Pricing model used for reservations
    pub cost: CostModel,

    /// Retry behaviour for this provider
    #[serde(default)]
    pub retry: RetryPolicy,

    /// How the call input is assembled
    pub input: InputMapping,

    /// What a complete payload looks like
    #[serde(default)]
    pub output: OutputSchema,
}

impl CollectorDefinition {
    /// Get the collector kind.
    #[must_use]
    pub fn kind(&self) -> CollectorKind {
        self.collector.kind
    }

    /// Get the collector name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.collector.name
    }

    /// Get the category of the collected data.
    #[must_use]
    pub fn category(&self) -> CollectorCategory {
        self.collector.kind.category()
    }

    /// Kind whose payload this collector needs, if any.
    #[must_use]
    pub fn depends_on(&self) -> Option<CollectorKind> {
        self.collector.depends_on
    }

    /// Return a copy with configuration overrides applied.
    #[must_use]
    pub fn with_override(mut self, o: &CollectorOverride) -> Self {
        if let Some(v) = o.max_attempts {
            self.retry.max_attempts = v;
        }
        if let Some(v) = o.base_backoff_ms {
            self.retry.base_backoff_ms = v;
        }
        if let Some(v) = o.max_backoff_ms {
            self.retry.max_backoff_ms = v;
        }
        if let Some(v) = o.jitter {
            self.retry.jitter = v;
        }
        if let Some(v) = o.call_timeout_secs {
            self.retry.call_timeout_secs = v;
        }
        if let Some(v) = o.reliability_weight {
            self.collector.reliability_weight = v;
        }
        if let Some(v) = o.rate_limit_per_minute {
            self.collector.rate_limit_per_minute = Some(v);
        }
        self
    }

    /// Validate the definition for completeness and correctness.
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind();

        if self.collector.name.is_empty() {
            return Err(invalid(kind, "collector name cannot be empty"));
        }

        if self.collector.depends_on == Some(kind) {
            return Err(invalid(kind, "collector cannot depend on itself"));
        }

        let weight = self.collector.reliability_weight;
        if !weight.is_finite() || weight < 0.0 {
            return Err(invalid(
                kind,
                &format!("reliability_weight must be a non-negative number, got {weight}"),
            ));
        }

        if self.collector.rate_limit_per_minute == Some(0) {
            return Err(invalid(kind, "rate_limit_per_minute must be at least 1"));
        }

        self.cost.validate(kind)?;
        self.retry.validate(kind)?;

        if self.input.target.is_empty() {
            return Err(invalid(kind, "input.target cannot be empty"));
        }
        if self.input.sources.is_empty() && self.input.upstream.is_none() {
            return Err(invalid(
                kind,
                "input needs at least one subject source or an upstream pointer",
            ));
        }
        if let Some(pointer) = &self.input.upstream {
            if self.collector.depends_on.is_none() {
                return Err(invalid(kind, "input.upstream requires depends_on"));
            }
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(invalid(
                    kind,
                    &format!("input.upstream must be a JSON pointer, got '{pointer}'"),
                ));
            }
        }
        if self.input.max_items == Some(0) {
            return Err(invalid(kind, "input.max_items must be at least 1"));
        }

        self.output.validate(kind)
    }
}

fn invalid(kind: CollectorKind, reason: &str) -> DefinitionError {
    DefinitionError::ValidationError {
        kind: kind.to_string(),
        reason: reason.to_string(),
    }
}

/// Core collector metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorMetadata {
    /// Collector kind this definition is for
    pub kind: CollectorKind,

    /// Human-readable collector name
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// HTTP endpoint for the generic HTTP adapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Environment variable holding the bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    /// Kind whose output this collector needs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<CollectorKind>,

    /// Scheduling priority within a stage (higher runs first)
    #[serde(default)]
    pub priority: i32,

    /// Weight of this source in the overall quality score
    #[serde(default = "default_reliability_weight")]
    pub reliability_weight: f64,

    /// Provider-wide call rate limit shared across requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit_per_minute: Option<u32>,
}

fn default_reliability_weight() -> f64 {
    1.0
}

/// Pricing models offered by collector providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum CostModel {
    /// Flat price per call
    Fixed {
        /// Price per call
        price: Cost,
    },

    /// Price quoted per `unit_size` lookup values
    PerUnit {
        /// Price per `unit_size` units
        price: Cost,
        /// Units covered by `price`
        unit_size: u64,
    },

    /// Base fee plus a per-unit price
    BasePlusUnit {
        /// Fee per call
        base: Cost,
        /// Price per `unit_size` units
        price: Cost,
        /// Units covered by `price`
        unit_size: u64,
    },

    /// Subscription provider; the share attributed to each call
    Subscription {
        /// Amount attributed per call
        price: Cost,
    },
}

impl CostModel {
    /// Estimated cost of a call that looks up `units` values.
    #[must_use]
    pub fn estimate(&self, units: u64) -> Cost {
        match self {
            Self::Fixed { price } | Self::Subscription { price } => *price,
            Self::PerUnit { price, unit_size } => price.mul_ratio(units, *unit_size),
            Self::BasePlusUnit {
                base,
                price,
                unit_size,
            } => *base + price.mul_ratio(units, *unit_size),
        }
    }

    fn validate(&self, kind: CollectorKind) -> Result<()> {
        match self {
            Self::PerUnit { unit_size, .. } | Self::BasePlusUnit { unit_size, .. }
                if *unit_size == 0 =>
            {
                Err(invalid(kind, "cost.unit_size must be at least 1"))
            }
            _ => Ok(()),
        }
    }
}

/// Retry behaviour for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_backoff_ms: u64,
    /// Ceiling for any single backoff delay
    pub max_backoff_ms: u64,
    /// Random spread applied to each delay, as a fraction (0.2 = ±20%)
    pub jitter: f64,
    /// Timeout for a single attempt
    pub call_timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            jitter: 0.2,
            call_timeout_secs: 300,
        }
    }
}

impl RetryPolicy {
    /// Delay before the second attempt.
    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    /// Ceiling for any single backoff delay.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Timeout for a single attempt.
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    fn validate(&self, kind: CollectorKind) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(invalid(kind, "retry.max_attempts must be at least 1"));
        }
        if self.base_backoff_ms > self.max_backoff_ms {
            return Err(invalid(
                kind,
                &format!(
                    "retry.base_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                    self.base_backoff_ms, self.max_backoff_ms
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(invalid(kind, "retry.jitter must be within 0.0-1.0"));
        }
        if self.call_timeout_secs == 0 {
            return Err(invalid(kind, "retry.call_timeout_secs must be at least 1"));
        }
        Ok(())
    }
}

/// What a complete payload contains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSchema {
    /// Dotted paths expected to be non-empty (e.g. `profile.headline`)
    pub expected_fields: Vec<String>,
    /// Dotted path to an RFC 3339 timestamp describing data age
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness_field: Option<String>,
    /// Age after which the payload counts as stale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_after_days: Option<u32>,
}

impl OutputSchema {
    fn validate(&self, kind: CollectorKind) -> Result<()> {
        if let Some(field) = self.expected_fields.iter().find(|f| f.trim().is_empty()) {
            return Err(invalid(
                kind,
                &format!("output.expected_fields contains a blank entry: '{field}'"),
            ));
        }
        if self.stale_after_days.is_some() && self.freshness_field.is_none() {
            return Err(invalid(
                kind,
                "output.stale_after_days requires output.freshness_field",
            ));
        }
        Ok(())
    }
}
