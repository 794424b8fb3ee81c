//! Prospector Application Shell
//!
//! Thin wiring between configuration, collector definitions and the engine.
//! Core business logic lives in the `crates/` directory.

use anyhow::{bail, Context, Result};
use prospector_collector::{
    CollectorDefinition, CollectorLoader, CollectorRegistry, HttpCollector,
};
use prospector_core::AppConfig;
use prospector_engine::{Orchestrator, Request};
use prospector_sink::JsonDirSink;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Initialize tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,prospector=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load configuration from `path`, or from the default location with
/// `PROSPECTOR_*` environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_env();
            config.validate().context("invalid configuration")?;
            config
        }
        None => AppConfig::load_with_env().context("failed to load configuration")?,
    };
    Ok(config)
}

/// Load every collector definition and apply the configured overrides.
pub fn load_definitions(config: &AppConfig) -> Result<Vec<CollectorDefinition>> {
    let loader = match &config.collectors.definitions_dir {
        Some(dir) => CollectorLoader::new(dir.clone()),
        None => CollectorLoader::with_default_dir(),
    }
    .context("collector definitions directory not found")?;

    info!(
        "Loading collector definitions from {}",
        loader.definitions_dir().display()
    );

    let definitions = loader
        .load_all()
        .context("failed to load collector definitions")?
        .into_iter()
        .map(|definition| match config.collector_override(definition.kind()) {
            Some(o) => definition.with_override(o),
            None => definition,
        })
        .collect();
    Ok(definitions)
}

/// Register an HTTP adapter for every definition that has an endpoint.
pub fn build_registry(definitions: Vec<CollectorDefinition>) -> Result<CollectorRegistry> {
    let mut builder = CollectorRegistry::builder();
    for definition in definitions {
        let kind = definition.kind();
        match HttpCollector::new(definition) {
            Ok(collector) => {
                builder = builder
                    .register(Arc::new(collector))
                    .with_context(|| format!("failed to register {kind}"))?;
            }
            Err(e) => warn!(kind = %kind, error = %e, "skipping collector"),
        }
    }
    Ok(builder.build())
}

/// Build the orchestrator, storing reports under `output` (or the
/// configured output directory) unless `store` is false.
pub fn build_orchestrator(
    config: &AppConfig,
    registry: CollectorRegistry,
    output: Option<PathBuf>,
    store: bool,
) -> Result<Orchestrator> {
    let orchestrator = Orchestrator::from_config(Arc::new(registry), config)
        .context("failed to build orchestrator")?;
    if !store {
        return Ok(orchestrator);
    }

    let dir = match output {
        Some(dir) => dir,
        None => config.output_dir().context("no output directory")?,
    };
    info!("Writing reports to {}", dir.display());
    Ok(orchestrator.with_sink(Arc::new(JsonDirSink::new(dir))))
}

/// Read a request from a JSON file.
pub fn load_request(path: &Path) -> Result<Request> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read request {}", path.display()))?;
    let request: Request = serde_json::from_str(&contents)
        .with_context(|| format!("invalid request JSON in {}", path.display()))?;
    if request.kinds.is_empty() {
        bail!("request {} names no collector kinds", path.display());
    }
    Ok(request)
}

/// One row of the `collectors` listing.
#[derive(Debug, Serialize)]
pub struct CollectorSummary {
    /// Kind identifier
    pub kind: String,
    /// Display name
    pub name: String,
    /// Data category
    pub category: String,
    /// Scheduling priority
    pub priority: i32,
    /// Kind whose payload this collector consumes
    pub depends_on: Option<String>,
    /// Calls per minute allowed by the provider
    pub rate_limit_per_minute: Option<u32>,
}

/// Summaries of the registered collectors, by kind.
#[must_use]
pub fn summarize(registry: &CollectorRegistry) -> Vec<CollectorSummary> {
    registry
        .definitions()
        .into_iter()
        .map(|d| CollectorSummary {
            kind: d.kind().to_string(),
            name: d.name().to_string(),
            category: d.category().to_string(),
            priority: d.collector.priority,
            depends_on: d.depends_on().map(|k| k.to_string()),
            rate_limit_per_minute: d.collector.rate_limit_per_minute,
        })
        .collect()
}
