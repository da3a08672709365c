//! Core domain types for the rowan request scheduler.
//!
//! Provides the persisted request model, the clock abstraction used for
//! deterministic testing, and the Prometheus instruments shared by the
//! ingestion and delivery paths. All other crates depend on these
//! foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod metrics;
pub mod models;
pub mod time;

pub use metrics::Metrics;
pub use models::{RequestId, StoredRequest};
pub use time::{Clock, RealClock};
