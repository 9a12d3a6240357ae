//! Repository for `emergency_broadcasts` and `broadcast_acknowledgments`.

use herald_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::broadcast::{EmergencyBroadcast, ResendFlag, BROADCAST_STATUS_ACTIVE};

/// Column list for `emergency_broadcasts` queries.
const COLUMNS: &str = "id, title, body, severity, status, channels, target_roles, branch_id, \
    sent_at, resend_interval_minutes, max_resends, resend_count, resend_requested_at, \
    pending_ack_count, created_at, updated_at";

/// Provides send, acknowledgment and resend bookkeeping for broadcasts.
pub struct BroadcastRepo;

impl BroadcastRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<EmergencyBroadcast>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM emergency_broadcasts WHERE id = $1");
        sqlx::query_as::<_, EmergencyBroadcast>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Mark a broadcast as sent to `recipient_count` users.
    ///
    /// `pending_ack_count` excludes users who already acknowledged.
    pub async fn mark_sent(
        pool: &PgPool,
        id: DbId,
        at: Timestamp,
        recipient_count: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE emergency_broadcasts \
             SET status = $2, \
                 sent_at = COALESCE(sent_at, $3), \
                 pending_ack_count = GREATEST($4 - ( \
                    SELECT COUNT(*) FROM broadcast_acknowledgments WHERE broadcast_id = $1 \
                 )::int, 0) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(BROADCAST_STATUS_ACTIVE)
        .bind(at)
        .bind(recipient_count)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record that `user_id` acknowledged the broadcast.
    ///
    /// Returns `false` if the user had already acknowledged it.
    pub async fn acknowledge(
        pool: &PgPool,
        broadcast_id: DbId,
        user_id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO broadcast_acknowledgments (broadcast_id, user_id, acknowledged_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (broadcast_id, user_id) DO NOTHING",
        )
        .bind(broadcast_id)
        .bind(user_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        let inserted = result.rows_affected() > 0;

        if inserted {
            sqlx::query(
                "UPDATE emergency_broadcasts \
                 SET pending_ack_count = GREATEST(pending_ack_count - 1, 0) \
                 WHERE id = $1",
            )
            .bind(broadcast_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Recount unacknowledged recipients of active broadcasts whose resend
    /// interval has elapsed, and flag those with pending recipients for
    /// resend.
    ///
    /// Only broadcasts with a resend interval and remaining resends are
    /// considered. Each returned row carries the fresh pending count.
    pub async fn flag_resends(pool: &PgPool, now: Timestamp) -> Result<Vec<ResendFlag>, sqlx::Error> {
        sqlx::query_as::<_, ResendFlag>(
            "WITH pending AS ( \
                SELECT b.id, ( \
                    SELECT COUNT(*) FROM users u \
                    JOIN roles r ON r.id = u.role_id \
                    WHERE u.is_active = true \
                      AND (jsonb_array_length(b.target_roles) = 0 \
                           OR r.name IN (SELECT jsonb_array_elements_text(b.target_roles))) \
                      AND (b.branch_id IS NULL OR u.branch_id = b.branch_id) \
                      AND NOT EXISTS ( \
                          SELECT 1 FROM broadcast_acknowledgments a \
                          WHERE a.broadcast_id = b.id AND a.user_id = u.id) \
                )::int AS unacked \
                FROM emergency_broadcasts b \
                WHERE b.status = $2 \
                  AND b.resend_interval_minutes IS NOT NULL \
                  AND b.resend_count < b.max_resends \
                  AND COALESCE(b.resend_requested_at, b.sent_at) \
                      <= $1 - make_interval(mins => b.resend_interval_minutes) \
             ) \
             UPDATE emergency_broadcasts b \
             SET pending_ack_count = p.unacked, \
                 resend_count = b.resend_count + CASE WHEN p.unacked > 0 THEN 1 ELSE 0 END, \
                 resend_requested_at = CASE WHEN p.unacked > 0 THEN $1 ELSE b.resend_requested_at END \
             FROM pending p \
             WHERE b.id = p.id \
             RETURNING b.id, b.pending_ack_count, b.resend_count, (p.unacked > 0) AS flagged",
        )
        .bind(now)
        .bind(BROADCAST_STATUS_ACTIVE)
        .fetch_all(pool)
        .await
    }
}
