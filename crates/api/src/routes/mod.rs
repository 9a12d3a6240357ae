pub mod broadcasts;
pub mod events;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /events                          submit (POST)
/// /events/{id}                     get
///
/// /broadcasts/{id}/send            fan out (POST)
/// /broadcasts/{id}/acknowledge     record acknowledgment (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/events", events::router())
        .nest("/broadcasts", broadcasts::router())
}
