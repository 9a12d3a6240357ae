//! Handlers for emergency broadcasts.

use axum::extract::{Path, State};
use axum::Json;
use herald_core::delivery::BulkDeliveryReport;
use herald_core::types::DbId;
use herald_events::BroadcastService;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /broadcasts/{id}/acknowledge`.
#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub user_id: DbId,
}

fn service(state: &AppState) -> AppResult<&BroadcastService> {
    state
        .broadcasts
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Broadcasts are not configured".into()))
}

/// POST /api/v1/broadcasts/{id}/send
///
/// Fans the broadcast out to its audience, bypassing preferences, and
/// returns the per-channel tally.
pub async fn send_broadcast(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<BulkDeliveryReport>>> {
    let report = service(&state)?.send(id).await?;
    Ok(Json(DataResponse { data: report }))
}

/// POST /api/v1/broadcasts/{id}/acknowledge
pub async fn acknowledge_broadcast(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<AcknowledgeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let acknowledged = service(&state)?.acknowledge(id, input.user_id).await?;
    Ok(Json(json!({ "data": { "acknowledged": acknowledged } })))
}
