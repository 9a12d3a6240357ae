//! Emergency broadcast and acknowledgment models.

use herald_core::event::Severity;
use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::json_string_list;

pub const BROADCAST_STATUS_ACTIVE: &str = "active";
pub const BROADCAST_STATUS_RESOLVED: &str = "resolved";

/// A row from the `emergency_broadcasts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EmergencyBroadcast {
    pub id: DbId,
    pub title: String,
    pub body: String,
    pub severity: String,
    pub status: String,
    pub channels: serde_json::Value,
    pub target_roles: serde_json::Value,
    pub branch_id: Option<DbId>,
    pub sent_at: Option<Timestamp>,
    pub resend_interval_minutes: Option<i32>,
    pub max_resends: i32,
    pub resend_count: i32,
    pub resend_requested_at: Option<Timestamp>,
    pub pending_ack_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl EmergencyBroadcast {
    pub fn severity(&self) -> Severity {
        Severity::parse(&self.severity).unwrap_or(Severity::Critical)
    }

    pub fn role_list(&self) -> Vec<String> {
        json_string_list(&self.target_roles)
    }

    pub fn channel_list(&self) -> Vec<String> {
        json_string_list(&self.channels)
    }

    pub fn is_resolved(&self) -> bool {
        self.status == BROADCAST_STATUS_RESOLVED
    }
}

/// A row from the `broadcast_acknowledgments` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BroadcastAcknowledgment {
    pub id: DbId,
    pub broadcast_id: DbId,
    pub user_id: DbId,
    pub acknowledged_at: Timestamp,
    pub created_at: Timestamp,
}

/// A broadcast the acknowledgment watchdog re-examined.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResendFlag {
    pub id: DbId,
    pub pending_ack_count: i32,
    pub resend_count: i32,
    /// Whether the broadcast was flagged for resend on this pass.
    pub flagged: bool,
}
