//! Handlers for the `/events` resource.
//!
//! Producers submit events here; rule matching and delivery happen
//! asynchronously in the event processor.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use herald_core::error::CoreError;
use herald_core::event::NewEvent;
use herald_core::types::DbId;
use herald_events::intake::Submission;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/events
///
/// Returns 201 with the stored event, or 200 with `"duplicate": true` when
/// an event with the same idempotency key already exists.
pub async fn create_event(
    State(state): State<AppState>,
    Json(input): Json<NewEvent>,
) -> AppResult<Response> {
    match state.intake.submit(input).await? {
        Submission::Accepted(event) => {
            tracing::info!(
                event_id = event.id,
                event_type = %event.event_type,
                source_module = %event.source_module,
                "Event submitted"
            );
            Ok((StatusCode::CREATED, Json(DataResponse { data: event })).into_response())
        }
        Submission::Duplicate => Ok((
            StatusCode::OK,
            Json(json!({ "data": null, "duplicate": true })),
        )
            .into_response()),
    }
}

/// GET /api/v1/events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let event = state
        .events
        .get(id)
        .await
        .map_err(herald_events::EngineError::from)?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Event",
            id,
        }))?;
    Ok(Json(DataResponse { data: event }))
}
