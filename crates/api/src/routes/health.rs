//! Health check and metrics endpoints.

use axum::{extract::State, http::StatusCode, Json};
use document_store::DocumentStore;
use telemetry::{health, metrics, MetricsSnapshot};
use tracing::warn;

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Full health check, pinging the store.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    match state.runner.store().ping().await {
        Ok(()) => health().store.set_healthy(),
        Err(e) => {
            warn!(error = %e, "Store ping failed");
            health().store.set_unhealthy(e.to_string());
        }
    }

    let report = health().report();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        store_connected: health().store.is_healthy(),
        report,
    })
}

/// GET /health/ready - Readiness probe (store reachable).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /metrics - Snapshot of the in-process counters.
pub async fn metrics_handler() -> Json<MetricsSnapshot> {
    Json(metrics().snapshot())
}
