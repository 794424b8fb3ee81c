//! Prospector Sink - Where finished reports go.
//!
//! The engine hands every finished envelope and its quality score to a
//! [`ResultSink`]. A failed store is reported alongside the envelope and
//! never discards it.
//!
//! # Sinks
//!
//! - [`MemorySink`]: in-process map, for tests and embedding callers
//! - [`JsonDirSink`]: one pretty-printed JSON file per request

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod error;
pub mod json_dir;
pub mod memory;
pub mod sink;

// Re-export commonly used types
pub use error::{Result, SinkError};
pub use json_dir::JsonDirSink;
pub use memory::MemorySink;
pub use sink::{ResultSink, SinkAck, StoredReport};
