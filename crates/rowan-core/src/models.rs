//! Domain models for scheduled HTTP requests.

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to every ingested request.
///
/// Eight random bytes, unique per ingestion. The id survives retries: the
/// rescheduled variant of a request keeps the uid of the original while its
/// storage key changes with the new delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub [u8; 8]);

impl RequestId {
    /// Generates a fresh random identifier.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Returns the raw bytes, used as the key suffix in the store.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 8]> for RequestId {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

/// The persisted unit of work.
///
/// Captures everything needed to replay an inbound HTTP request against the
/// upstream: method, path (including query), multi-valued headers, and body
/// are preserved verbatim across retries. `ttl` counts the remaining
/// delivery attempts and is at least 1 for any stored record; `retry`
/// counts attempts already performed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRequest {
    /// Unique identifier for this logical request.
    pub uid: RequestId,

    /// Earliest delivery moment, in nanoseconds since the Unix epoch.
    pub delivery_time: i64,

    /// HTTP method to use for the outbound request.
    pub method: String,

    /// URL path and query appended to the configured base URL.
    pub path: String,

    /// HTTP headers to propagate. Values are ordered per header name.
    pub headers: HashMap<String, Vec<String>>,

    /// Request body, possibly empty.
    pub body: Vec<u8>,

    /// Remaining delivery attempts before the request is dropped.
    pub ttl: u32,

    /// Number of delivery attempts already performed.
    pub retry: u32,

    /// True while a worker owns this record. Only meaningful within a
    /// single process lifetime; stale flags are cleared at startup.
    pub scheduled: bool,
}

impl StoredRequest {
    /// Returns the delivery time as a UTC timestamp.
    pub fn delivery_time_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.delivery_time)
    }
}
