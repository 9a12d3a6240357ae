//! Notification entity model.

use herald_core::event::Severity;
use herald_core::notification::{Notification, NotificationStatus};
use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::json_string_list;

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationRow {
    pub id: DbId,
    pub event_id: Option<DbId>,
    pub rule_id: Option<DbId>,
    pub user_id: DbId,
    pub branch_id: Option<DbId>,
    pub title: String,
    pub body: String,
    pub severity: String,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub metadata: serde_json::Value,
    pub channels: serde_json::Value,
    pub status: String,
    pub is_read: bool,
    pub read_at: Option<Timestamp>,
    pub delivered_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let channels = json_string_list(&row.channels);
        Notification {
            id: row.id,
            event_id: row.event_id,
            rule_id: row.rule_id,
            user_id: row.user_id,
            branch_id: row.branch_id,
            title: row.title,
            body: row.body,
            severity: Severity::parse(&row.severity).unwrap_or_default(),
            action_url: row.action_url,
            action_label: row.action_label,
            metadata: row.metadata,
            channels,
            status: NotificationStatus::parse(&row.status).unwrap_or_default(),
            created_at: row.created_at,
            delivered_at: row.delivered_at,
        }
    }
}
