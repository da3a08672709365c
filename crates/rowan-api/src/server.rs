//! HTTP server setup for ingestion and metrics exposition.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use rowan_core::Metrics;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{handlers, AppState};

/// Builds the ingestion router.
///
/// Every method and path is an ingestion, so the handler is the fallback
/// rather than a fixed route table.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .fallback(handlers::ingest)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the metrics router serving Prometheus text format.
pub fn metrics_router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .with_state(metrics)
}

async fn serve_metrics(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(encode_error) => {
            error!(error = %encode_error, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

/// Serves a router until the token is cancelled, then drains in-flight
/// connections.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!(%addr, "HTTP server stopped");
    Ok(())
}
