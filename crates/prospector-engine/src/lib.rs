//! Prospector Engine - Request orchestration over metered collectors.
//!
//! This crate runs enrichment requests: it plans one task per requested
//! collector kind, executes the tasks concurrently in dependency order under
//! a per-request budget and deadline, and assembles the results into a
//! scored envelope.
//!
//! # Features
//!
//! - Bounded worker pool with dependency-ordered scheduling
//! - Budget reservation before every call, settlement after, with batches
//!   trimmed to fit when the budget strategy allows
//! - Retries with exponential backoff for transient failures
//! - Provider rate limits shared across requests, applied to every attempt
//! - Cooperative cancellation on deadline or abort
//!
//! # Example
//!
//! ```rust,ignore
//! use prospector_engine::{Orchestrator, Request};
//! use prospector_core::{CollectorKind, Cost};
//! use std::sync::Arc;
//!
//! let orchestrator = Orchestrator::new(Arc::new(registry))?;
//! let request = Request::new(subject, vec![CollectorKind::LinkedinProfile, CollectorKind::Zoominfo])
//!     .with_budget(Cost::from_usd(5.0));
//!
//! let outcome = orchestrator.run(request).await?;
//! println!("quality {:.0}%", outcome.score.percent());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregate;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod rate_limit;
pub mod request;
pub mod retry;
pub mod task;
pub mod worker;

// Re-export commonly used types
pub use aggregate::{aggregate, RunMeta};
pub use error::{AggregateError, EngineError, PlanError, Result};
pub use orchestrator::{Orchestrator, RunHandle, RunOutcome, RunPhase, SinkStatus};
pub use plan::{ExecutionPlan, PlannedTask};
pub use rate_limit::{ProviderLimiters, RateLimiter};
pub use request::Request;
pub use retry::{RetryContext, RetryExecutor, RetryOutcome, RetryStatus};
pub use task::{CancelSignal, TaskState, TaskTable};
pub use worker::TaskRunner;
