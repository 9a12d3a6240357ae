//! Scheduled notification definition model.

use chrono::NaiveTime;
use herald_core::event::Severity;
use herald_core::recurrence::Recurrence;
use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::{json_id_list, json_string_list};

/// A row from the `scheduled_notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScheduledNotification {
    pub id: DbId,
    pub title: String,
    pub body: String,
    pub severity: String,
    pub channels: serde_json::Value,
    pub target_roles: serde_json::Value,
    pub target_user_ids: serde_json::Value,
    pub branch_id: Option<DbId>,
    pub recurrence: String,
    pub scheduled_time: NaiveTime,
    pub next_run_at: Option<Timestamp>,
    pub last_run_at: Option<Timestamp>,
    pub run_count: i32,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScheduledNotification {
    /// Unknown values are treated as `once` so a bad row cannot repeat forever.
    pub fn recurrence(&self) -> Recurrence {
        Recurrence::parse(&self.recurrence).unwrap_or(Recurrence::Once)
    }

    pub fn severity(&self) -> Severity {
        Severity::parse(&self.severity).unwrap_or_default()
    }

    pub fn channel_list(&self) -> Vec<String> {
        json_string_list(&self.channels)
    }

    pub fn role_list(&self) -> Vec<String> {
        json_string_list(&self.target_roles)
    }

    pub fn user_id_list(&self) -> Vec<DbId> {
        json_id_list(&self.target_user_ids)
    }
}
