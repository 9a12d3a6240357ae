use std::sync::Arc;

use herald_events::store::EventStore;
use herald_events::{BroadcastService, EngineStatus, EventIntake};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Read access to events, also used as the health probe.
    pub events: Arc<dyn EventStore>,
    pub intake: EventIntake,
    pub status: Arc<EngineStatus>,
    /// `None` when running without Postgres (tests, embedding).
    pub broadcasts: Option<BroadcastService>,
}
