//! Announcement model.

use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::json_string_list;

pub const ANNOUNCEMENT_STATUS_SCHEDULED: &str = "scheduled";
pub const ANNOUNCEMENT_STATUS_PUBLISHED: &str = "published";

/// A row from the `announcements` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Announcement {
    pub id: DbId,
    pub title: String,
    pub body: String,
    pub status: String,
    pub publish_at: Option<Timestamp>,
    pub published_at: Option<Timestamp>,
    pub notify_users: bool,
    pub target_roles: serde_json::Value,
    pub branch_id: Option<DbId>,
    pub channels: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Announcement {
    pub fn role_list(&self) -> Vec<String> {
        json_string_list(&self.target_roles)
    }

    pub fn channel_list(&self) -> Vec<String> {
        json_string_list(&self.channels)
    }
}
