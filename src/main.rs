//! rowan, a durable HTTP request scheduler.
//!
//! Main entry point. Parses flags, recovers the store, and coordinates the
//! ingestion server, the metrics endpoint, and the delivery engine through
//! startup and graceful shutdown.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rowan_api::{server, AppState, Config};
use rowan_core::{Clock, Metrics, RealClock};
use rowan_delivery::DeliveryEngine;
use rowan_store::RequestStore;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::parse();
    config.validate().context("invalid configuration")?;

    info!(
        base_url = %config.base_url,
        workers = config.max_concurrent_requests,
        inbound_port = config.inbound_port,
        metrics_port = config.metrics_port,
        storage_path = %config.storage_path.display(),
        "starting rowan"
    );

    let store = Arc::new(
        RequestStore::open(&config.storage_path).context("could not open request store")?,
    );

    // Claim flags are only meaningful within one process lifetime; clear
    // leftovers from an ungraceful shutdown before the first dispatch pass.
    let recovered = store
        .recover_inflight()
        .context("could not recover in-flight requests")?;
    if recovered > 0 {
        info!(recovered, "reset in-flight flags from previous run");
    }

    let metrics = Arc::new(Metrics::new().context("could not register metrics")?);
    let clock: Arc<dyn Clock> = Arc::new(RealClock::new());

    let engine = DeliveryEngine::new(
        store.clone(),
        metrics.clone(),
        clock.clone(),
        config.engine_config()?,
    )?;
    let shutdown = engine.cancellation_token();

    let inbound_listener = TcpListener::bind(("0.0.0.0", config.inbound_port))
        .await
        .with_context(|| format!("could not bind inbound port {}", config.inbound_port))?;
    let metrics_listener = TcpListener::bind(("0.0.0.0", config.metrics_port))
        .await
        .with_context(|| format!("could not bind metrics port {}", config.metrics_port))?;

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received, draining");
            shutdown.cancel();
        });
    }

    let state = AppState::new(store, clock, metrics.clone());
    let inbound_server = tokio::spawn(server::serve(
        inbound_listener,
        server::create_router(state),
        shutdown.clone(),
    ));
    let metrics_server = tokio::spawn(server::serve(
        metrics_listener,
        server::metrics_router(metrics),
        shutdown.clone(),
    ));

    // The engine runs until cancelled or a fatal storage fault; either way
    // the servers are stopped before the process exits.
    let engine_result = engine.run().await;
    shutdown.cancel();

    inbound_server
        .await
        .context("inbound server task panicked")?
        .context("inbound server failed")?;
    metrics_server
        .await
        .context("metrics server task panicked")?
        .context("metrics server failed")?;

    engine_result.context("delivery engine failed")?;

    info!("service shutdown completed");
    Ok(())
}

/// Initializes tracing with environment-based filtering.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,rowan=debug"))
        .expect("invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(signal_error) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %signal_error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(signal_error) => {
                tracing::error!(error = %signal_error, "failed to install SIGTERM handler");
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
