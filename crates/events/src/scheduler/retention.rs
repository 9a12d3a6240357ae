//! Daily retention cleanup of processed events and read notifications.

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use herald_core::types::Timestamp;
use herald_db::repositories::{EventRepo, NotificationRepo};
use sqlx::PgPool;

use super::{PeriodicJob, Schedule};
use crate::error::EngineResult;

/// Rows older than this are eligible for deletion.
pub fn retention_cutoff(now: Timestamp, retention_days: i64) -> Timestamp {
    now - chrono::Duration::days(retention_days.max(1))
}

pub struct RetentionCleanup {
    pool: PgPool,
    retention_days: i64,
    run_at: NaiveTime,
}

impl RetentionCleanup {
    pub fn new(pool: PgPool, retention_days: i64, run_at: NaiveTime) -> Self {
        Self {
            pool,
            retention_days,
            run_at,
        }
    }
}

#[async_trait]
impl PeriodicJob for RetentionCleanup {
    fn name(&self) -> &'static str {
        "retention_cleanup"
    }

    fn schedule(&self) -> Schedule {
        Schedule::DailyAt(self.run_at)
    }

    async fn run_once(&self) -> EngineResult<usize> {
        let cutoff = retention_cutoff(Utc::now(), self.retention_days);
        let notifications = NotificationRepo::delete_read_before(&self.pool, cutoff).await?;
        let events = EventRepo::delete_processed_before(&self.pool, cutoff).await?;
        if notifications + events > 0 {
            tracing::info!(
                events,
                notifications,
                retention_days = self.retention_days,
                "Retention: purged old rows"
            );
        }
        Ok(usize::try_from(notifications + events).unwrap_or(usize::MAX))
    }
}
