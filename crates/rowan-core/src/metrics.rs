//! Prometheus instruments for the ingestion and delivery paths.
//!
//! A single [`Metrics`] instance is created at startup and shared by the
//! inbound server and the delivery workers. Instruments live in their own
//! registry so the exposition endpoint serves exactly the service's
//! metrics.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "rowan";

/// Counters and histograms labelled by HTTP status code.
pub struct Metrics {
    registry: Registry,
    inbound_http_requests: IntCounterVec,
    outbound_http_requests: IntCounterVec,
    outbound_http_latencies: HistogramVec,
}

impl Metrics {
    /// Creates the instrument set and registers it in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let inbound_http_requests = IntCounterVec::new(
            Opts::new(
                "inbound_http_requests_total",
                "Cumulative number of inbound HTTP requests by status code.",
            )
            .namespace(NAMESPACE),
            &["code"],
        )?;

        let outbound_http_requests = IntCounterVec::new(
            Opts::new(
                "outbound_http_requests_total",
                "Cumulative number of outbound HTTP requests by status code.",
            )
            .namespace(NAMESPACE),
            &["code"],
        )?;

        let outbound_http_latencies = HistogramVec::new(
            HistogramOpts::new(
                "outbound_http_requests_latencies",
                "Duration in seconds from expected to actual delivery time.",
            )
            .namespace(NAMESPACE),
            &["code"],
        )?;

        registry.register(Box::new(inbound_http_requests.clone()))?;
        registry.register(Box::new(outbound_http_requests.clone()))?;
        registry.register(Box::new(outbound_http_latencies.clone()))?;

        Ok(Self {
            registry,
            inbound_http_requests,
            outbound_http_requests,
            outbound_http_latencies,
        })
    }

    /// Counts an inbound response by status code.
    pub fn record_inbound(&self, status: u16) {
        self.inbound_http_requests
            .with_label_values(&[&status.to_string()])
            .inc();
    }

    /// Counts an outbound attempt and observes the delay between the
    /// record's delivery time and response completion.
    ///
    /// Transport failures are reported with a synthetic status of 400.
    pub fn record_outbound(&self, status: u16, delay_seconds: f64) {
        let code = status.to_string();
        self.outbound_http_requests
            .with_label_values(&[&code])
            .inc();
        self.outbound_http_latencies
            .with_label_values(&[&code])
            .observe(delay_seconds.max(0.0));
    }

    /// Renders all registered metrics in Prometheus text format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_counter_increments_per_code() {
        let metrics = Metrics::new().unwrap();
        metrics.record_inbound(200);
        metrics.record_inbound(200);
        metrics.record_inbound(400);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("rowan_inbound_http_requests_total{code=\"200\"} 2"));
        assert!(text.contains("rowan_inbound_http_requests_total{code=\"400\"} 1"));
    }

    #[test]
    fn outbound_records_counter_and_latency() {
        let metrics = Metrics::new().unwrap();
        metrics.record_outbound(500, 1.5);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("rowan_outbound_http_requests_total{code=\"500\"} 1"));
        assert!(text.contains("rowan_outbound_http_requests_latencies_count{code=\"500\"} 1"));
    }

    #[test]
    fn negative_delay_is_clamped_to_zero() {
        let metrics = Metrics::new().unwrap();
        metrics.record_outbound(200, -0.25);

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("rowan_outbound_http_requests_latencies_sum{code=\"200\"} 0"));
    }
}
