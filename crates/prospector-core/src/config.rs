//! Configuration management for Prospector.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use crate::types::CollectorKind;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/prospector/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Orchestration settings
    pub engine: EngineConfig,
    /// Budget ledger settings
    pub budget: BudgetConfig,
    /// Quality scoring settings
    pub quality: QualityConfig,
    /// Collector definition location and per-kind overrides
    pub collectors: CollectorsConfig,
    /// Result sink settings
    pub sink: SinkConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML or fail validation
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `PROSPECTOR_MAX_CONCURRENCY`: Override the per-request worker limit
    /// - `PROSPECTOR_DEFAULT_BUDGET_USD`: Override the default request budget
    /// - `PROSPECTOR_DEFINITIONS_DIR`: Override the collector definitions directory
    /// - `PROSPECTOR_OUTPUT_DIR`: Override the result sink output directory
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `PROSPECTOR_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("PROSPECTOR_MAX_CONCURRENCY") {
            if let Ok(n) = val.parse() {
                self.engine.max_concurrency = n;
                tracing::debug!("Override engine.max_concurrency from env: {}", n);
            }
        }

        if let Ok(val) = std::env::var("PROSPECTOR_DEFAULT_BUDGET_USD") {
            if let Ok(usd) = val.parse() {
                self.budget.default_limit_usd = usd;
                tracing::debug!("Override budget.default_limit_usd from env: {}", usd);
            }
        }

        if let Ok(val) = std::env::var("PROSPECTOR_DEFINITIONS_DIR") {
            tracing::debug!("Override collectors.definitions_dir from env: {}", val);
            self.collectors.definitions_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("PROSPECTOR_OUTPUT_DIR") {
            tracing::debug!("Override sink.output_dir from env: {}", val);
            self.sink.output_dir = Some(PathBuf::from(val));
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.engine.max_concurrency == 0 {
            return Err(invalid("engine.max_concurrency", "must be at least 1"));
        }
        if self.engine.default_timeout_secs == 0 {
            return Err(invalid("engine.default_timeout_secs", "must be at least 1"));
        }
        if !self.budget.default_limit_usd.is_finite() || self.budget.default_limit_usd < 0.0 {
            return Err(invalid(
                "budget.default_limit_usd",
                "must be a non-negative amount",
            ));
        }
        if self.budget.alert_threshold_pct > 100 {
            return Err(invalid("budget.alert_threshold_pct", "must be 0-100"));
        }
        if self.budget.economy_batch_size == 0 {
            return Err(invalid("budget.economy_batch_size", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.quality.stale_penalty) {
            return Err(invalid("quality.stale_penalty", "must be within 0.0-1.0"));
        }

        for (name, override_) in &self.collectors.overrides {
            if name.parse::<CollectorKind>().is_err() {
                return Err(invalid(
                    &format!("collectors.overrides.{name}"),
                    "unknown collector kind",
                ));
            }
            if override_.max_attempts == Some(0) {
                return Err(invalid(
                    &format!("collectors.overrides.{name}.max_attempts"),
                    "must be at least 1",
                ));
            }
            if let Some(jitter) = override_.jitter {
                if !(0.0..=1.0).contains(&jitter) {
                    return Err(invalid(
                        &format!("collectors.overrides.{name}.jitter"),
                        "must be within 0.0-1.0",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/prospector/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/prospector`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Directory the JSON sink writes reports to.
    ///
    /// Falls back to `<data_dir>/reports` when not configured.
    pub fn output_dir(&self) -> ConfigResult<PathBuf> {
        match &self.sink.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("reports")),
        }
    }

    /// Overrides for one collector kind, if configured.
    #[must_use]
    pub fn collector_override(&self, kind: CollectorKind) -> Option<&CollectorOverride> {
        self.collectors.overrides.get(kind.as_str())
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "prospector", "prospector").ok_or(ConfigError::NoConfigDir)
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of collector calls in flight per request
    pub max_concurrency: usize,
    /// Global deadline applied when a request does not carry one
    pub default_timeout_secs: u64,
    /// Extra percentage reserved on top of each estimate
    pub reservation_headroom_pct: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            default_timeout_secs: 300,
            reservation_headroom_pct: 0,
        }
    }
}

/// Budget ledger settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Budget applied when a request does not carry one
    pub default_limit_usd: f64,
    /// Percentage of the limit at which a budget alert is logged
    pub alert_threshold_pct: u8,
    /// How tasks are fitted into the remaining budget
    pub strategy: BudgetStrategy,
    /// Batch cap applied to every task under [`BudgetStrategy::Cost`]
    pub economy_batch_size: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_limit_usd: 100.0,
            alert_threshold_pct: 80,
            strategy: BudgetStrategy::default(),
            economy_batch_size: 5,
        }
    }
}

/// How a task's input is sized against the budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStrategy {
    /// Cap every batch at `economy_batch_size`, then trim further if the
    /// reservation is still denied
    Cost,
    /// Send the full batch; trim it only when the reservation is denied
    #[default]
    Balanced,
    /// Never trim; a task the budget cannot cover is skipped
    Quality,
}

impl BudgetStrategy {
    /// Whether a denied batch may be trimmed to fit.
    #[must_use]
    pub fn trims_to_fit(self) -> bool {
        !matches!(self, Self::Quality)
    }
}

/// Quality scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Fraction removed from a kind's completeness when its data is stale
    pub stale_penalty: f64,
    /// Reliability weights below this are flagged as low-confidence sources
    pub low_confidence_weight: f64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            stale_penalty: 0.25,
            low_confidence_weight: 0.5,
        }
    }
}

/// Collector definition location and per-kind overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorsConfig {
    /// Directory containing collector definition TOML files
    pub definitions_dir: Option<PathBuf>,
    /// Overrides keyed by collector kind identifier (e.g. `linkedin_profile`)
    pub overrides: BTreeMap<String, CollectorOverride>,
}

/// Per-kind overrides applied on top of a collector definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorOverride {
    /// Maximum call attempts
    pub max_attempts: Option<u32>,
    /// First backoff delay in milliseconds
    pub base_backoff_ms: Option<u64>,
    /// Backoff ceiling in milliseconds
    pub max_backoff_ms: Option<u64>,
    /// Jitter fraction applied to each backoff delay
    pub jitter: Option<f64>,
    /// Per-attempt timeout in seconds
    pub call_timeout_secs: Option<u64>,
    /// Reliability weight used by the quality scorer
    pub reliability_weight: Option<f64>,
    /// Provider-wide call rate limit
    pub rate_limit_per_minute: Option<u32>,
}

/// Result sink settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Directory for JSON reports (defaults to `<data_dir>/reports`)
    pub output_dir: Option<PathBuf>,
}
