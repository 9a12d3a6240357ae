//! Event entity model.

use herald_core::event::{Event, Severity};
use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRow {
    pub id: DbId,
    pub source_module: String,
    pub event_type: String,
    pub severity: String,
    pub occurred_at: Timestamp,
    pub payload: serde_json::Value,
    pub branch_id: Option<DbId>,
    pub user_id: Option<DbId>,
    pub idempotency_key: Option<String>,
    pub processed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            source_module: row.source_module,
            event_type: row.event_type,
            // The column CHECK constraint admits only known severities.
            severity: Severity::parse(&row.severity).unwrap_or_default(),
            occurred_at: row.occurred_at,
            payload: row.payload,
            branch_id: row.branch_id,
            user_id: row.user_id,
            idempotency_key: row.idempotency_key,
            processed_at: row.processed_at,
        }
    }
}
