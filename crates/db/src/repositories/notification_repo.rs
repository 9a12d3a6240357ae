//! Repository for the `notifications` table.

use herald_core::notification::{NewNotification, NotificationStatus};
use herald_core::rate_limit::{Admission, RateLimitPolicy, RecentCounts};
use herald_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::notification::NotificationRow;

/// Column list for `notifications` queries.
const COLUMNS: &str = "id, event_id, rule_id, user_id, branch_id, title, body, severity, \
    action_url, action_label, metadata, channels, status, is_read, read_at, delivered_at, \
    created_at";

const INSERT_COLUMNS: &str = "event_id, rule_id, user_id, branch_id, title, body, severity, \
    action_url, action_label, metadata, channels, created_at";

/// Provides creation, rate-limit and status operations for notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert a notification that is not subject to rate limiting.
    ///
    /// Returns `None` when a row for the same (event, rule, user) exists.
    pub async fn create(
        pool: &PgPool,
        new: &NewNotification,
        now: Timestamp,
    ) -> Result<Option<NotificationRow>, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::insert(&mut *conn, new, now).await
    }

    /// Check the rule's rate limit for `new.user_id` and insert in one
    /// transaction.
    ///
    /// A transaction-scoped advisory lock keyed on (user, rule) serialises
    /// concurrent callers for the same pair, so two workers cannot both pass
    /// the cooldown check.
    pub async fn create_rate_limited(
        pool: &PgPool,
        new: &NewNotification,
        policy: RateLimitPolicy,
        now: Timestamp,
    ) -> Result<Admission, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if let Some(rule_id) = new.rule_id {
            sqlx::query(
                "SELECT pg_advisory_xact_lock( \
                    ($1::bigint % 2147483647)::int, ($2::bigint % 2147483647)::int)",
            )
            .bind(new.user_id)
            .bind(rule_id)
            .execute(&mut *tx)
            .await?;

            if let Some(event_id) = new.event_id {
                let exists: bool = sqlx::query_scalar(
                    "SELECT EXISTS ( \
                        SELECT 1 FROM notifications \
                        WHERE event_id = $1 AND rule_id = $2 AND user_id = $3)",
                )
                .bind(event_id)
                .bind(rule_id)
                .bind(new.user_id)
                .fetch_one(&mut *tx)
                .await?;
                if exists {
                    tx.commit().await?;
                    return Ok(Admission::Duplicate);
                }
            }

            if !policy.is_unlimited() {
                let (within_cooldown, within_hour): (i64, i64) = sqlx::query_as(
                    "SELECT \
                        COUNT(*) FILTER (WHERE created_at > $3), \
                        COUNT(*) FILTER (WHERE created_at > $4) \
                     FROM notifications \
                     WHERE user_id = $1 AND rule_id = $2",
                )
                .bind(new.user_id)
                .bind(rule_id)
                .bind(policy.cooldown_since(now))
                .bind(policy.hourly_since(now))
                .fetch_one(&mut *tx)
                .await?;

                let counts = RecentCounts {
                    within_cooldown,
                    within_hour,
                };
                if let Some(reason) = policy.check(counts) {
                    tx.commit().await?;
                    return Ok(Admission::Throttled(reason));
                }
            }
        }

        let row = Self::insert(&mut *tx, new, now).await?;
        tx.commit().await?;

        Ok(match row {
            Some(row) => Admission::Created(row.into()),
            None => Admission::Duplicate,
        })
    }

    async fn insert(
        conn: &mut PgConnection,
        new: &NewNotification,
        now: Timestamp,
    ) -> Result<Option<NotificationRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications ({INSERT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (event_id, rule_id, user_id) \
                WHERE event_id IS NOT NULL AND rule_id IS NOT NULL \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(new.event_id)
            .bind(new.rule_id)
            .bind(new.user_id)
            .bind(new.branch_id)
            .bind(&new.title)
            .bind(&new.body)
            .bind(new.severity.as_str())
            .bind(new.action_url.as_deref())
            .bind(new.action_label.as_deref())
            .bind(&new.metadata)
            .bind(serde_json::json!(new.channels))
            .bind(now)
            .fetch_optional(&mut *conn)
            .await
    }

    /// All notifications produced for an event, ordered by user.
    pub async fn list_for_event(
        pool: &PgPool,
        event_id: DbId,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE event_id = $1 \
             ORDER BY user_id ASC, rule_id ASC"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    /// Notifications for (event, rule) still waiting for delivery.
    ///
    /// Left behind when processing stopped between insert and delivery.
    pub async fn list_pending_for_rule(
        pool: &PgPool,
        event_id: DbId,
        rule_id: DbId,
    ) -> Result<Vec<NotificationRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE event_id = $1 AND rule_id = $2 AND status = $3 \
             ORDER BY user_id ASC"
        );
        sqlx::query_as::<_, NotificationRow>(&query)
            .bind(event_id)
            .bind(rule_id)
            .bind(NotificationStatus::Pending.as_str())
            .fetch_all(pool)
            .await
    }

    /// Delete read notifications whose `read_at` is older than `cutoff`.
    pub async fn delete_read_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM notifications \
             WHERE is_read = true AND read_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
