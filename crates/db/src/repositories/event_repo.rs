//! Repository for the `events` table.

use herald_core::event::NewEvent;
use herald_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::event::EventRow;

/// Column list for `events` queries.
const COLUMNS: &str = "id, source_module, event_type, severity, occurred_at, payload, \
    branch_id, user_id, idempotency_key, processed_at, created_at";

/// Provides insert, lookup and processing-state operations for events.
pub struct EventRepo;

impl EventRepo {
    /// Insert an event.
    ///
    /// Returns `None` when `idempotency_key` is already taken; the existing
    /// row is left untouched.
    pub async fn insert(pool: &PgPool, new: &NewEvent) -> Result<Option<EventRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO events \
                (source_module, event_type, severity, occurred_at, payload, \
                 branch_id, user_id, idempotency_key) \
             VALUES ($1, $2, $3, COALESCE($4, NOW()), $5, $6, $7, $8) \
             ON CONFLICT (idempotency_key) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(&new.source_module)
            .bind(&new.event_type)
            .bind(new.severity.as_str())
            .bind(new.occurred_at)
            .bind(&new.payload)
            .bind(new.branch_id)
            .bind(new.user_id)
            .bind(new.idempotency_key.as_deref())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<EventRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM events WHERE id = $1");
        sqlx::query_as::<_, EventRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set `processed_at` unless it is already set.
    ///
    /// The stored value is never earlier than `occurred_at`. Returns `true`
    /// if this call performed the update.
    pub async fn mark_processed(pool: &PgPool, id: DbId, at: Timestamp) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE events \
             SET processed_at = GREATEST($2, occurred_at) \
             WHERE id = $1 AND processed_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Oldest unprocessed events first.
    pub async fn list_unprocessed(pool: &PgPool, limit: i64) -> Result<Vec<EventRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE processed_at IS NULL \
             ORDER BY id ASC \
             LIMIT $1"
        );
        sqlx::query_as::<_, EventRow>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn last_processed_at(pool: &PgPool) -> Result<Option<Timestamp>, sqlx::Error> {
        sqlx::query_scalar("SELECT MAX(processed_at) FROM events")
            .fetch_one(pool)
            .await
    }

    /// Delete processed events older than `cutoff`.
    ///
    /// Unprocessed events are never deleted. Notifications keep their rows
    /// with `event_id` set to NULL.
    pub async fn delete_processed_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM events \
             WHERE processed_at IS NOT NULL AND processed_at < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
