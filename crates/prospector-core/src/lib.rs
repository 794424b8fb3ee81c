//! Prospector Core - Foundation crate for the Prospector enrichment engine.
//!
//! This crate provides shared types, error handling and configuration
//! management that every other Prospector crate depends on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`RequestId`, `RunId`, `Cost`, `CollectorKind`, `Timestamp`)
//!
//! # Example
//!
//! ```rust
//! use prospector_core::{AppConfig, CollectorKind, Cost};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.engine.max_concurrency, 5);
//!
//! let estimate = Cost::from_usd(0.004);
//! assert_eq!(estimate.as_micros(), 4_000);
//! assert_eq!(CollectorKind::LinkedinProfile.as_str(), "linkedin_profile");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BudgetConfig, BudgetStrategy, CollectorOverride, CollectorsConfig, EngineConfig,
    QualityConfig, SinkConfig,
};
pub use error::{ConfigError, ConfigResult, ProspectorError, Result};
pub use types::{CollectorCategory, CollectorKind, Cost, RequestId, RunId, Timestamp};
