use axum::routing::post;
use axum::Router;

use crate::handlers::broadcast;
use crate::state::AppState;

/// Routes mounted at `/broadcasts`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/send", post(broadcast::send_broadcast))
        .route("/{id}/acknowledge", post(broadcast::acknowledge_broadcast))
}
