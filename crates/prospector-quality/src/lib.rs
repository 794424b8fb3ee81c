//! Prospector Quality - Completeness and reliability scoring.
//!
//! Scores an [`AggregatedEnvelope`](prospector_collector::AggregatedEnvelope)
//! against the expected fields each collector declares.
//!
//! # Scoring
//!
//! - Per kind: non-empty expected fields over expected fields, reduced by the
//!   staleness penalty when the freshest record is too old
//! - Overall: reliability-weighted average over every requested kind; kinds
//!   without data contribute zero but keep their weight
//! - No successful kind: score 0 with the `no_data` flag
//! - Letter grade and per-category roll-up
//!
//! # Example
//!
//! ```rust,no_run
//! use prospector_collector::CollectorRegistry;
//! use prospector_quality::{QualitySchema, QualityScorer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CollectorRegistry::builder().build();
//! let scorer = QualityScorer::new(QualitySchema::from_registry(&registry)?);
//! # let _ = scorer;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod fields;
pub mod schema;
pub mod score;
pub mod scorer;

// Re-export commonly used types
pub use error::{QualityError, Result};
pub use fields::FieldPath;
pub use schema::{KindSchema, QualitySchema};
pub use score::{CategoryScore, Deduction, DeductionReason, Grade, KindScore, QualityScore};
pub use scorer::{QualityScorer, ScoringSettings};
