//! Inbound HTTP surface for the request scheduler.
//!
//! Provides the ingestion server that turns arbitrary inbound requests into
//! stored records, the Prometheus metrics endpoint, and the flag-driven
//! service configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod server;

use std::sync::Arc;

pub use config::Config;
use rowan_core::{Clock, Metrics};
use rowan_store::RequestStore;

/// Shared state for the ingestion handlers.
#[derive(Clone)]
pub struct AppState {
    /// Persistent request store the handlers produce into.
    pub store: Arc<RequestStore>,
    /// Clock used for default delivery times.
    pub clock: Arc<dyn Clock>,
    /// Instruments for inbound request accounting.
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Creates the shared handler state.
    pub fn new(store: Arc<RequestStore>, clock: Arc<dyn Clock>, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            clock,
            metrics,
        }
    }
}
