//! Repository for the `notification_rules` table.

use herald_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::rule::RuleRow;

/// Column list for `notification_rules` queries.
const COLUMNS: &str = "id, name, is_active, priority, source_module, event_type_pattern, \
    condition_dsl, notification_template, cooldown_minutes, max_per_hour, \
    last_triggered_at, created_at, updated_at";

/// Provides read access to notification rules.
pub struct RuleRepo;

impl RuleRepo {
    /// Active rules in firing order: `priority DESC, id ASC`.
    pub async fn list_active(pool: &PgPool) -> Result<Vec<RuleRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_rules \
             WHERE is_active = true \
             ORDER BY priority DESC, id ASC"
        );
        sqlx::query_as::<_, RuleRow>(&query).fetch_all(pool).await
    }

    /// Record that the rule produced at least one notification at `at`.
    pub async fn mark_triggered(pool: &PgPool, id: DbId, at: Timestamp) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE notification_rules \
             SET last_triggered_at = GREATEST(COALESCE(last_triggered_at, $2), $2) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
