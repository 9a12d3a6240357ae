//! User notification preference model.

use chrono::NaiveTime;
use herald_core::preferences::UserPreferences;
use herald_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `user_notification_preferences` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PreferenceRow {
    pub id: DbId,
    pub user_id: DbId,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub sms_enabled: bool,
    pub chat_enabled: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    pub utc_offset_minutes: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<PreferenceRow> for UserPreferences {
    fn from(row: PreferenceRow) -> Self {
        UserPreferences {
            user_id: row.user_id,
            email_enabled: row.email_enabled,
            push_enabled: row.push_enabled,
            sms_enabled: row.sms_enabled,
            chat_enabled: row.chat_enabled,
            quiet_hours_start: row.quiet_hours_start,
            quiet_hours_end: row.quiet_hours_end,
            utc_offset_minutes: row.utc_offset_minutes,
        }
    }
}
