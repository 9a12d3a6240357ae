//! Repository for the `announcements` table.

use herald_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::announcement::{
    Announcement, ANNOUNCEMENT_STATUS_PUBLISHED, ANNOUNCEMENT_STATUS_SCHEDULED,
};

/// Column list for `announcements` queries.
const COLUMNS: &str = "id, title, body, status, publish_at, published_at, notify_users, \
    target_roles, branch_id, channels, created_at, updated_at";

/// Provides publishing operations for announcements.
pub struct AnnouncementRepo;

impl AnnouncementRepo {
    /// Scheduled announcements whose `publish_at` has passed.
    pub async fn list_due(pool: &PgPool, now: Timestamp) -> Result<Vec<Announcement>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM announcements \
             WHERE status = $1 AND publish_at IS NOT NULL AND publish_at <= $2 \
             ORDER BY publish_at ASC, id ASC"
        );
        sqlx::query_as::<_, Announcement>(&query)
            .bind(ANNOUNCEMENT_STATUS_SCHEDULED)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Promote a scheduled announcement to published.
    ///
    /// Returns `true` if this call performed the transition.
    pub async fn mark_published(pool: &PgPool, id: DbId, at: Timestamp) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE announcements \
             SET status = $2, published_at = $3 \
             WHERE id = $1 AND status = $4",
        )
        .bind(id)
        .bind(ANNOUNCEMENT_STATUS_PUBLISHED)
        .bind(at)
        .bind(ANNOUNCEMENT_STATUS_SCHEDULED)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
