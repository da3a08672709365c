//! Error types for delivery operations.

use rowan_store::StorageError;
use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Failures from the dispatcher and worker paths.
///
/// Transport failures and upstream rejections are not errors here; they
/// feed the retry policy and never escape a worker. What remains is fatal:
/// storage faults mid-delivery risk loss or double delivery, so the engine
/// stops and reports them.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The persistent store failed during claim, delete, or reschedule.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The outbound HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Configuration(String),

    /// A stored request could not be turned into an outbound call.
    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),

    /// The outbound call failed without producing a response.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// A worker task panicked instead of returning.
    #[error("delivery worker {worker_id} panicked")]
    WorkerPanic {
        /// Index of the worker that panicked.
        worker_id: usize,
    },
}
