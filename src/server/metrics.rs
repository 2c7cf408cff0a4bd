//! Metrics and health HTTP server for Prometheus scraping.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use anyhow::Context;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::engine::Engine;
use crate::metrics;
use crate::server::shutdown::shutdown_receiver;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Prometheus text exposition of the global registry.
async fn metrics_handler() -> Response {
    match metrics::get_metrics().gather() {
        Ok(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Cannot encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Liveness plus the number of live queues.
async fn health_handler(State(engine): State<Engine>) -> Response {
    let queues = engine.registry().all_queues().await.len();
    (StatusCode::OK, Json(json!({ "status": "ok", "queues": queues }))).into_response()
}

/// Routes served by the metrics server.
pub fn router(engine: Engine) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(engine)
}

/// Serve [`router`] on `bind_address:port` until `shutdown_rx` fires.
pub async fn start_metrics_server(
    engine: Engine,
    bind_address: String,
    port: u16,
    shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", bind_address, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind metrics server to {}", addr))?;
    info!(address = %addr, "Metrics server listening");

    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown_receiver(shutdown_rx))
        .await
        .context("Metrics server failed")?;

    info!("Metrics server stopped");
    Ok(())
}
