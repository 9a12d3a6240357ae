//! Repository for the `scheduled_notifications` table.

use herald_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::scheduled_notification::ScheduledNotification;

/// Column list for `scheduled_notifications` queries.
const COLUMNS: &str = "id, title, body, severity, channels, target_roles, target_user_ids, \
    branch_id, recurrence, scheduled_time, next_run_at, last_run_at, run_count, is_active, \
    created_at, updated_at";

/// Provides due-lookup and run bookkeeping for scheduled notifications.
pub struct ScheduledNotificationRepo;

impl ScheduledNotificationRepo {
    /// Active definitions with `next_run_at <= now`, oldest first.
    pub async fn list_due(
        pool: &PgPool,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<ScheduledNotification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM scheduled_notifications \
             WHERE is_active = true AND next_run_at IS NOT NULL AND next_run_at <= $1 \
             ORDER BY next_run_at ASC, id ASC \
             LIMIT $2"
        );
        sqlx::query_as::<_, ScheduledNotification>(&query)
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Claim a due run and advance the schedule.
    ///
    /// Succeeds only if `next_run_at` still equals `expected`, so a run is
    /// claimed by exactly one dispatcher. A `next` of `None` deactivates the
    /// definition. Returns `true` if this call claimed the run.
    pub async fn claim_run(
        pool: &PgPool,
        id: DbId,
        expected: Timestamp,
        next: Option<Timestamp>,
        ran_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE scheduled_notifications \
             SET next_run_at = $3, \
                 last_run_at = $4, \
                 run_count = run_count + 1, \
                 is_active = ($3 IS NOT NULL) \
             WHERE id = $1 AND is_active = true AND next_run_at = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .bind(ran_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ScheduledNotification>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM scheduled_notifications WHERE id = $1");
        sqlx::query_as::<_, ScheduledNotification>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
