//! Repository for the `user_notification_preferences` table.

use herald_core::types::DbId;
use sqlx::PgPool;

use crate::models::preference::PreferenceRow;

/// Column list for `user_notification_preferences` queries.
const COLUMNS: &str = "id, user_id, email_enabled, push_enabled, sms_enabled, chat_enabled, \
    quiet_hours_start, quiet_hours_end, utc_offset_minutes, created_at, updated_at";

/// Provides access to per-user delivery preferences.
pub struct PreferenceRepo;

impl PreferenceRepo {
    pub async fn find_for_user(pool: &PgPool, user_id: DbId) -> Result<Option<PreferenceRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_notification_preferences WHERE user_id = $1");
        sqlx::query_as::<_, PreferenceRow>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
