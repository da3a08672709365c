//! HTTP client for outbound delivery.
//!
//! Composes the outbound URL from the configured base URL and the stored
//! path, forwards the stored headers, and injects the scheduler headers
//! that tell the upstream how many attempts have been made and remain.

use std::time::Duration;

use chrono::SecondsFormat;
use reqwest::{Method, Url};
use rowan_core::StoredRequest;
use tracing::debug;

use crate::error::{DeliveryError, Result};

/// Configuration for the outbound HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL all outbound requests are issued against; the stored path
    /// and query replace the base's path and query.
    pub base_url: Url,

    /// Total timeout for a single outbound call.
    pub timeout: Duration,

    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://example.com").expect("static URL is valid"),
            timeout: Duration::from_secs(10),
            user_agent: "rowan/0.1".to_string(),
        }
    }
}

/// HTTP client issuing delivery attempts against the upstream.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl DeliveryClient {
    /// Creates a new delivery client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| DeliveryError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Issues one delivery attempt and returns the response status code.
    ///
    /// The stored headers are forwarded minus hop-by-hop headers the client
    /// manages itself; the scheduler's own headers are always set fresh so
    /// the upstream sees the current retry count, remaining TTL, and the
    /// scheduled delivery time in RFC3339 form.
    pub async fn deliver(&self, request: &StoredRequest) -> Result<u16> {
        let url = self.outbound_url(request);
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| DeliveryError::InvalidRequest(e.to_string()))?;

        debug!(
            uid = %request.uid,
            %url,
            method = %request.method,
            retry = request.retry,
            "issuing outbound request"
        );

        let mut outbound = self.client.request(method, url);
        for (name, values) in &request.headers {
            if is_managed_header(name) || is_scheduler_header(name) {
                continue;
            }
            for value in values {
                outbound = outbound.header(name, value);
            }
        }

        let delivery_time = request
            .delivery_time_utc()
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let response = outbound
            .header("X-Rowan-Retrycount", request.retry.to_string())
            .header("X-Rowan-Ttl", request.ttl.to_string())
            .header("X-Rowan-Deliverytime", delivery_time)
            .body(request.body.clone())
            .send()
            .await?;

        Ok(response.status().as_u16())
    }

    fn outbound_url(&self, request: &StoredRequest) -> Url {
        let mut url = self.config.base_url.clone();
        match request.path.split_once('?') {
            Some((path, query)) => {
                url.set_path(path);
                url.set_query(Some(query));
            },
            None => {
                url.set_path(&request.path);
                url.set_query(None);
            },
        }
        url
    }
}

/// Headers the HTTP client manages itself; copying these from the stored
/// request would conflict with the values it computes.
fn is_managed_header(name: &str) -> bool {
    let lowercase = name.to_lowercase();
    matches!(
        lowercase.as_str(),
        "content-length"
            | "host"
            | "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Headers the scheduler injects on every attempt. Stored copies from the
/// original ingestion are superseded by the current values.
fn is_scheduler_header(name: &str) -> bool {
    let lowercase = name.to_lowercase();
    matches!(
        lowercase.as_str(),
        "x-rowan-retrycount" | "x-rowan-ttl" | "x-rowan-deliverytime"
    )
}

#[cfg(test)]
mod tests {
    use rowan_testing::fixtures::{post_request, stored_request};
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> DeliveryClient {
        let config = ClientConfig {
            base_url: Url::parse(&server.uri()).expect("mock server URI is valid"),
            ..ClientConfig::default()
        };
        DeliveryClient::new(config).expect("failed to build client")
    }

    #[tokio::test]
    async fn delivers_method_path_and_body() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/callback"))
            .and(matchers::body_bytes(b"payload".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = post_request(1, 0, "/callback", b"payload");

        let status = client.deliver(&request).await.expect("delivery failed");
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn query_string_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(matchers::path("/jobs"))
            .and(matchers::query_param("attempt", "1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut request = stored_request(1, 0);
        request.path = "/jobs?attempt=1".to_string();

        let status = client.deliver(&request).await.expect("delivery failed");
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn scheduler_headers_reflect_current_state() {
        let server = MockServer::start().await;
        Mock::given(matchers::header("X-Rowan-Retrycount", "2"))
            .and(matchers::header("X-Rowan-Ttl", "1"))
            .and(matchers::header_exists("X-Rowan-Deliverytime"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut request = stored_request(1, 0);
        request.retry = 2;
        request.ttl = 1;

        let status = client.deliver(&request).await.expect("delivery failed");
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn stored_headers_forwarded_including_repeats() {
        let server = MockServer::start().await;
        Mock::given(matchers::header("x-trace", "origin"))
            .and(matchers::header("x-trace", "relay"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = post_request(1, 0, "/callback", b"x");

        let status = client.deliver(&request).await.expect("delivery failed");
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn stale_scheduler_headers_are_replaced() {
        let server = MockServer::start().await;
        Mock::given(matchers::header("X-Rowan-Ttl", "3"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut request = stored_request(1, 0);
        // The producer's original TTL header was persisted with the rest.
        request
            .headers
            .insert("x-rowan-ttl".to_string(), vec!["9".to_string()]);
        request.ttl = 3;

        let status = client.deliver(&request).await.expect("delivery failed");
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn non_success_status_is_reported_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = stored_request(1, 0);

        let status = client.deliver(&request).await.expect("delivery failed");
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        // Nothing listens on this port.
        let config = ClientConfig {
            base_url: Url::parse("http://127.0.0.1:9").expect("static URL is valid"),
            timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        };
        let client = DeliveryClient::new(config).expect("failed to build client");
        let request = stored_request(1, 0);

        let result = client.deliver(&request).await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));
    }

    #[test]
    fn managed_and_scheduler_headers_identified() {
        assert!(is_managed_header("Content-Length"));
        assert!(is_managed_header("HOST"));
        assert!(is_scheduler_header("X-Rowan-Retrycount"));
        assert!(is_scheduler_header("x-rowan-deliverytime"));
        assert!(!is_managed_header("x-custom"));
        assert!(!is_scheduler_header("x-rowan-unrelated"));
    }
}
