//! Ingestion handler.
//!
//! Accepts any method, path, and body, turns the inbound request into a
//! stored record, and persists it for later delivery. Two headers steer
//! admission: `X-Rowan-Ttl` bounds the number of delivery attempts and
//! `X-Rowan-Deliverytime` (RFC3339) defers delivery; both default when
//! absent.

use std::collections::HashMap;

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use rowan_core::{Clock, RequestId, StoredRequest};
use tracing::{debug, error};

use crate::AppState;

/// Delivery attempts granted when the producer sends no TTL header.
pub const DEFAULT_TTL: u32 = 3;

/// Upper bound on inbound body size. Bodies are buffered whole; requests
/// beyond this are rejected rather than read.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Persists one inbound request for scheduled delivery.
pub async fn ingest(State(state): State<AppState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let ttl = match parse_ttl(&parts.headers) {
        Ok(ttl) => ttl,
        Err(()) => {
            return respond(
                &state,
                StatusCode::BAD_REQUEST,
                "could not parse X-Rowan-Ttl header",
            )
        },
    };

    let delivery_time = match parse_delivery_time(&parts.headers, state.clock.as_ref()) {
        Ok(nanos) => nanos,
        Err(()) => {
            return respond(
                &state,
                StatusCode::BAD_REQUEST,
                "could not parse X-Rowan-Deliverytime header",
            )
        },
    };

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(read_error) => {
            debug!(error = %read_error, "rejecting unreadable inbound body");
            return respond(&state, StatusCode::BAD_REQUEST, "could not read request body");
        },
    };

    let path = parts
        .uri
        .path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());

    let stored = StoredRequest {
        uid: RequestId::random(),
        delivery_time,
        method: parts.method.as_str().to_string(),
        path,
        headers: extract_headers(&parts.headers),
        body: body.to_vec(),
        ttl,
        retry: 0,
        scheduled: false,
    };

    match state.store.put(&stored) {
        Ok(()) => {
            debug!(
                uid = %stored.uid,
                method = %stored.method,
                path = %stored.path,
                delivery_time = stored.delivery_time,
                ttl = stored.ttl,
                "request admitted"
            );
            respond(&state, StatusCode::OK, "")
        },
        Err(storage_fault) => {
            error!(error = %storage_fault, "failed to persist inbound request");
            respond(
                &state,
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal storage error",
            )
        },
    }
}

fn parse_ttl(headers: &HeaderMap) -> Result<u32, ()> {
    let Some(value) = headers.get("x-rowan-ttl") else {
        return Ok(DEFAULT_TTL);
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|ttl| *ttl >= 1)
        .ok_or(())
}

fn parse_delivery_time(headers: &HeaderMap, clock: &dyn Clock) -> Result<i64, ()> {
    let Some(value) = headers.get("x-rowan-deliverytime") else {
        return Ok(clock.now_unix_nanos());
    };
    value
        .to_str()
        .ok()
        .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw.trim()).ok())
        .and_then(|timestamp| timestamp.timestamp_nanos_opt())
        .ok_or(())
}

/// Collects inbound headers preserving every value of repeated names in
/// arrival order.
fn extract_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok().map(str::to_string))
            .collect();
        if !values.is_empty() {
            map.insert(name.as_str().to_string(), values);
        }
    }
    map
}

fn respond(state: &AppState, status: StatusCode, message: &str) -> Response {
    state.metrics.record_inbound(status.as_u16());
    (status, message.to_string()).into_response()
}
