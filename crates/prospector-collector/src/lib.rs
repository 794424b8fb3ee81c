//! Prospector Collector - The collector contract and collector definitions.
//!
//! This crate defines how the engine talks to metered external data sources
//! ("collectors") and how each source is declared statically.
//!
//! # Architecture
//!
//! - **Contract** ([`collector`]): the [`Collector`] trait and its call context
//! - **Definitions** ([`definition`]): pricing, retry policy, dependency, expected fields
//! - **Input** ([`input`]): the request [`Subject`] and input construction
//! - **Loader** ([`loader`]): TOML loading from `collector-definitions/`
//! - **Registry** ([`registry`]): static kind-to-implementation map
//! - **Results** ([`result`], [`envelope`]): per-task results and the aggregated envelope
//! - **HTTP adapter** ([`http`]): generic JSON-over-HTTP collector
//! - **Errors** ([`error`]): definition errors and the call failure taxonomy
//!
//! # Example
//!
//! ```rust,no_run
//! use prospector_collector::{CollectorLoader, CollectorRegistry, HttpCollector};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = CollectorLoader::with_default_dir()?;
//! let mut builder = CollectorRegistry::builder();
//! for definition in loader.load_all()? {
//!     builder = builder.register(Arc::new(HttpCollector::new(definition)?))?;
//! }
//! let registry = builder.build();
//! println!("{} collectors registered", registry.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod collector;
pub mod definition;
pub mod envelope;
pub mod error;
pub mod http;
pub mod input;
pub mod loader;
pub mod registry;
pub mod result;

// Re-export commonly used types
pub use collector::{CallContext, CallFailure, CallOutput, CallResult, Collector};
pub use definition::{
    CollectorDefinition, CollectorMetadata, CostModel, OutputSchema, RetryPolicy,
};
pub use envelope::{AggregatedEnvelope, MissingKind};
pub use error::{CollectorError, DefinitionError, FailureClass, Result};
pub use http::HttpCollector;
pub use input::{CollectorInput, InputMapping, Subject, SubjectField};
pub use loader::CollectorLoader;
pub use registry::{CollectorRegistry, CollectorRegistryBuilder};
pub use result::{CancelReason, CollectorResult, ResultStatus, SkipReason, TaskUsage};
