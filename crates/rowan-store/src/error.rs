//! Storage error types.

use thiserror::Error;

/// Result type alias for store operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Failures from the persistent request store.
///
/// Storage faults on the delivery path are not recoverable without risking
/// duplicate delivery or loss, so callers there treat them as fatal.
#[derive(Debug, Error)]
pub enum StorageError {
    /// RocksDB reported an I/O or engine failure.
    #[error("rocksdb error: {0}")]
    RocksDb(String),

    /// A stored value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rocksdb::Error> for StorageError {
    fn from(err: rocksdb::Error) -> Self {
        Self::RocksDb(err.to_string())
    }
}
