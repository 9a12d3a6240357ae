use axum::extract::State;
use axum::{routing::get, Json, Router};
use herald_core::types::Timestamp;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the event store cannot be queried.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    pub scheduler_running: bool,
    pub processor_running: bool,
    pub last_processed_event_at: Option<Timestamp>,
}

/// GET /health -- engine liveness and the last processed event time.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (db_healthy, last_processed_event_at) = match state.events.last_processed_at().await {
        Ok(at) => (true, at),
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not query events");
            (false, None)
        }
    };

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        scheduler_running: state.status.scheduler_running(),
        processor_running: state.status.processor_running(),
        last_processed_event_at,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
