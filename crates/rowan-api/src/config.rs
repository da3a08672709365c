//! Service configuration from command-line flags.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use rowan_delivery::{ClientConfig, EngineConfig, Url};

/// Service flags. Long names keep the underscore form the service has
/// always exposed.
#[derive(Debug, Clone, Parser)]
#[command(name = "rowan", about = "Durable HTTP request scheduler")]
pub struct Config {
    /// Upstream base URL outbound requests are issued against.
    #[arg(long = "base_url", default_value = "http://example.com")]
    pub base_url: String,

    /// Total timeout for one outbound HTTP call (e.g. "500ms", "10s", "1m").
    #[arg(long = "client_timeout", default_value = "10s", value_parser = parse_duration_flag)]
    pub client_timeout: Duration,

    /// Number of concurrent delivery workers.
    #[arg(long = "max_concurrent_requests", default_value_t = 10)]
    pub max_concurrent_requests: usize,

    /// Port the ingestion server listens on.
    #[arg(long = "inbound_port", default_value_t = 8080)]
    pub inbound_port: u16,

    /// Port the Prometheus metrics endpoint listens on.
    #[arg(long = "metrics_port", default_value_t = 8081)]
    pub metrics_port: u16,

    /// Filesystem path of the request store.
    #[arg(long = "storage_path", default_value = "data.db")]
    pub storage_path: PathBuf,
}

impl Config {
    /// Validates flag values beyond what parsing enforces.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            anyhow::bail!("max_concurrent_requests must be greater than 0");
        }
        if self.client_timeout.is_zero() {
            anyhow::bail!("client_timeout must be greater than 0");
        }
        Url::parse(&self.base_url).context("base_url is not a valid URL")?;
        Ok(())
    }

    /// Builds the delivery engine configuration from the flags.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let base_url = Url::parse(&self.base_url).context("base_url is not a valid URL")?;
        Ok(EngineConfig {
            worker_count: self.max_concurrent_requests,
            client: ClientConfig {
                base_url,
                timeout: self.client_timeout,
                ..ClientConfig::default()
            },
            ..EngineConfig::default()
        })
    }
}

fn parse_duration_flag(value: &str) -> Result<Duration, String> {
    parse_duration(value).ok_or_else(|| format!("invalid duration: {value}"))
}

/// Parses durations like "300ms", "10s", "5m", "2h". A bare number is
/// treated as seconds.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse().ok().map(Duration::from_millis);
    }
    if let Some(hours) = value.strip_suffix('h') {
        return hours
            .trim()
            .parse::<u64>()
            .ok()
            .map(|h| Duration::from_secs(h * 3600));
    }
    if let Some(minutes) = value.strip_suffix('m') {
        return minutes
            .trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60));
    }
    if let Some(seconds) = value.strip_suffix('s') {
        return seconds.trim().parse().ok().map(Duration::from_secs);
    }
    value.parse().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_flags(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("rowan").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_the_service_contract() {
        let config = parse_flags(&[]);

        assert_eq!(config.base_url, "http://example.com");
        assert_eq!(config.client_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_requests, 10);
        assert_eq!(config.inbound_port, 8080);
        assert_eq!(config.metrics_port, 8081);
        assert_eq!(config.storage_path, PathBuf::from("data.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse_flags(&[
            "--base_url",
            "http://upstream:9000",
            "--client_timeout",
            "500ms",
            "--max_concurrent_requests",
            "4",
            "--inbound_port",
            "7000",
            "--metrics_port",
            "7001",
            "--storage_path",
            "/tmp/rowan.db",
        ]);

        assert_eq!(config.base_url, "http://upstream:9000");
        assert_eq!(config.client_timeout, Duration::from_millis(500));
        assert_eq!(config.max_concurrent_requests, 4);
        assert_eq!(config.inbound_port, 7000);
        assert_eq!(config.metrics_port, 7001);
    }

    #[test]
    fn duration_suffixes_parse() {
        assert_eq!(parse_duration("300ms"), Some(Duration::from_millis(300)));
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = parse_flags(&[]);
        config.max_concurrent_requests = 0;
        assert!(config.validate().is_err());

        let mut config = parse_flags(&[]);
        config.client_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = parse_flags(&[]);
        config.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn engine_config_carries_flag_values() {
        let config = parse_flags(&[
            "--base_url",
            "http://upstream:9000",
            "--client_timeout",
            "3s",
            "--max_concurrent_requests",
            "6",
        ]);

        let engine = config.engine_config().expect("conversion failed");
        assert_eq!(engine.worker_count, 6);
        assert_eq!(engine.client.timeout, Duration::from_secs(3));
        assert_eq!(engine.client.base_url.as_str(), "http://upstream:9000/");
    }
}
