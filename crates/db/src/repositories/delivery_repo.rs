//! Repository for the `notification_deliveries` table.

use herald_core::delivery::DeliveryReport;
use herald_core::types::DbId;
use sqlx::PgPool;

use crate::models::delivery::NotificationDelivery;

/// Column list for `notification_deliveries` queries.
const COLUMNS: &str = "id, notification_id, channel, outcome, detail, attempted_at, created_at";

/// Persists per-channel delivery results.
pub struct DeliveryRepo;

impl DeliveryRepo {
    /// Write every channel result of `report` and the resulting notification
    /// status in one transaction.
    pub async fn record_report(pool: &PgPool, report: &DeliveryReport) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        for entry in &report.channels {
            sqlx::query(
                "INSERT INTO notification_deliveries \
                    (notification_id, channel, outcome, detail, attempted_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(report.notification_id)
            .bind(&entry.channel)
            .bind(entry.outcome.label())
            .bind(entry.outcome.detail())
            .bind(entry.completed_at)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE notifications \
             SET status = $2, delivered_at = $3 \
             WHERE id = $1",
        )
        .bind(report.notification_id)
        .bind(report.status.as_str())
        .bind(report.delivered_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    pub async fn list_for_notification(
        pool: &PgPool,
        notification_id: DbId,
    ) -> Result<Vec<NotificationDelivery>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notification_deliveries \
             WHERE notification_id = $1 \
             ORDER BY id ASC"
        );
        sqlx::query_as::<_, NotificationDelivery>(&query)
            .bind(notification_id)
            .fetch_all(pool)
            .await
    }
}
