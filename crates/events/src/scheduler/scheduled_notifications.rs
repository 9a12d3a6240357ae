//! Scheduled-notification dispatcher.
//!
//! Finds active definitions whose `next_run_at` has passed, claims each run
//! by advancing the schedule with a compare-and-set, then fans out. A run
//! claimed by another instance is skipped.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use herald_core::notification::NewNotification;
use herald_core::recurrence::next_run_after;
use herald_db::models::scheduled_notification::ScheduledNotification;
use herald_db::repositories::ScheduledNotificationRepo;
use serde_json::json;
use sqlx::PgPool;

use super::{PeriodicJob, Schedule};
use crate::delivery::DeliveryOrchestrator;
use crate::error::EngineResult;
use crate::targets::{bulk_template, resolve_targets};

/// Definitions loaded per pass.
const BATCH_SIZE: i64 = 100;

/// The notification each target of `definition` receives.
pub fn scheduled_notification(definition: &ScheduledNotification) -> NewNotification {
    bulk_template(&definition.title, &definition.body, definition.channel_list())
        .with_severity(definition.severity())
        .with_branch(definition.branch_id)
        .with_metadata(json!({ "scheduled_notification_id": definition.id }))
}

pub struct ScheduledNotificationDispatcher {
    pool: PgPool,
    orchestrator: DeliveryOrchestrator,
    interval: Duration,
}

impl ScheduledNotificationDispatcher {
    pub fn new(pool: PgPool, orchestrator: DeliveryOrchestrator, interval: Duration) -> Self {
        Self {
            pool,
            orchestrator,
            interval,
        }
    }

    async fn dispatch(&self, definition: &ScheduledNotification) -> EngineResult<bool> {
        let Some(previous) = definition.next_run_at else {
            return Ok(false);
        };
        let now = Utc::now();
        let next = next_run_after(definition.recurrence(), definition.scheduled_time, previous, now);

        if !ScheduledNotificationRepo::claim_run(&self.pool, definition.id, previous, next, now).await? {
            tracing::debug!(scheduled_id = definition.id, "Scheduled run already claimed");
            return Ok(false);
        }

        let targets = resolve_targets(
            &self.pool,
            &definition.role_list(),
            &definition.user_id_list(),
            definition.branch_id,
        )
        .await?;
        let report = self
            .orchestrator
            .notify_users(&targets, &scheduled_notification(definition), false)
            .await;

        tracing::info!(
            scheduled_id = definition.id,
            recurrence = definition.recurrence().as_str(),
            next_run_at = ?next,
            total_users = report.total_users,
            delivered_users = report.delivered_users,
            "Scheduled notification dispatched"
        );
        Ok(true)
    }
}

#[async_trait]
impl PeriodicJob for ScheduledNotificationDispatcher {
    fn name(&self) -> &'static str {
        "scheduled_notification_dispatcher"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.interval)
    }

    async fn run_once(&self) -> EngineResult<usize> {
        let due = ScheduledNotificationRepo::list_due(&self.pool, Utc::now(), BATCH_SIZE).await?;
        let mut dispatched = 0;
        for definition in &due {
            // One bad definition must not hold up the rest of the batch.
            match self.dispatch(definition).await {
                Ok(true) => dispatched += 1,
                Ok(false) => {}
                Err(e) => tracing::error!(
                    scheduled_id = definition.id,
                    error = %e,
                    "Scheduled notification dispatch failed"
                ),
            }
        }
        Ok(dispatched)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;
    use herald_core::event::Severity;
    use herald_core::recurrence::Recurrence;

    use super::*;

    #[test]
    fn notification_uses_definition_fields() {
        let now = Utc::now();
        let definition = ScheduledNotification {
            id: 11,
            title: "Weekly stocktake".into(),
            body: "Count aisle 4".into(),
            severity: "warning".into(),
            channels: json!(["email"]),
            target_roles: json!(["warehouse_manager"]),
            target_user_ids: json!([5, 6]),
            branch_id: Some(1),
            recurrence: "fortnightly".into(),
            scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            next_run_at: Some(now),
            last_run_at: None,
            run_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let n = scheduled_notification(&definition);
        assert_eq!(n.severity, Severity::Warning);
        assert_eq!(n.channels, vec!["email"]);
        assert_eq!(n.branch_id, Some(1));
        assert_eq!(n.metadata["scheduled_notification_id"], 11);
        assert_eq!(definition.recurrence(), Recurrence::Once);
    }
}
