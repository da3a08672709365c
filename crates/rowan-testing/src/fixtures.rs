//! Stored-request fixtures for test suites.

use std::collections::HashMap;

use rowan_core::{RequestId, StoredRequest};

/// Returns a minimal GET request with a deterministic uid.
///
/// The uid is the given byte repeated, so fixtures with distinct bytes
/// never collide and test failures print recognizable ids.
pub fn stored_request(uid: u8, delivery_time: i64) -> StoredRequest {
    StoredRequest {
        uid: RequestId([uid; 8]),
        delivery_time,
        method: "GET".to_string(),
        path: "/jobs".to_string(),
        headers: HashMap::new(),
        body: Vec::new(),
        ttl: 3,
        retry: 0,
        scheduled: false,
    }
}

/// Returns a POST request carrying a body and a multi-valued header.
pub fn post_request(uid: u8, delivery_time: i64, path: &str, body: &[u8]) -> StoredRequest {
    let mut headers = HashMap::new();
    headers.insert(
        "x-trace".to_string(),
        vec!["origin".to_string(), "relay".to_string()],
    );
    StoredRequest {
        uid: RequestId([uid; 8]),
        delivery_time,
        method: "POST".to_string(),
        path: path.to_string(),
        headers,
        body: body.to_vec(),
        ttl: 3,
        retry: 0,
        scheduled: false,
    }
}
