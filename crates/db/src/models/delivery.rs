//! Per-channel delivery attempt model.

use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notification_deliveries` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationDelivery {
    pub id: DbId,
    pub notification_id: DbId,
    pub channel: String,
    /// `sent`, `failed` or `skipped`.
    pub outcome: String,
    /// Error message or skip reason.
    pub detail: Option<String>,
    pub attempted_at: Timestamp,
    pub created_at: Timestamp,
}
