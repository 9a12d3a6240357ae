//! Announcement publisher.
//!
//! Promotes scheduled announcements whose `publish_at` has passed and, when
//! asked to, notifies the targeted users.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use herald_core::notification::NewNotification;
use herald_db::models::announcement::Announcement;
use herald_db::repositories::AnnouncementRepo;
use serde_json::json;
use sqlx::PgPool;

use super::{PeriodicJob, Schedule};
use crate::delivery::DeliveryOrchestrator;
use crate::error::EngineResult;
use crate::targets::{bulk_template, resolve_targets};

pub fn announcement_notification(announcement: &Announcement) -> NewNotification {
    bulk_template(&announcement.title, &announcement.body, announcement.channel_list())
        .with_branch(announcement.branch_id)
        .with_metadata(json!({ "announcement_id": announcement.id }))
}

pub struct AnnouncementPublisher {
    pool: PgPool,
    orchestrator: DeliveryOrchestrator,
    interval: Duration,
}

impl AnnouncementPublisher {
    pub fn new(pool: PgPool, orchestrator: DeliveryOrchestrator, interval: Duration) -> Self {
        Self {
            pool,
            orchestrator,
            interval,
        }
    }
}

#[async_trait]
impl PeriodicJob for AnnouncementPublisher {
    fn name(&self) -> &'static str {
        "announcement_publisher"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.interval)
    }

    async fn run_once(&self) -> EngineResult<usize> {
        let now = Utc::now();
        let due = AnnouncementRepo::list_due(&self.pool, now).await?;

        let mut published = 0;
        for announcement in &due {
            if !AnnouncementRepo::mark_published(&self.pool, announcement.id, now).await? {
                continue;
            }
            published += 1;
            tracing::info!(announcement_id = announcement.id, "Announcement published");

            if announcement.notify_users {
                let targets = resolve_targets(
                    &self.pool,
                    &announcement.role_list(),
                    &[],
                    announcement.branch_id,
                )
                .await?;
                let report = self
                    .orchestrator
                    .notify_users(&targets, &announcement_notification(announcement), false)
                    .await;
                tracing::info!(
                    announcement_id = announcement.id,
                    total_users = report.total_users,
                    delivered_users = report.delivered_users,
                    "Announcement notifications sent"
                );
            }
        }
        Ok(published)
    }
}
