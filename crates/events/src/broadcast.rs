//! Emergency broadcasts: fan-out that ignores preferences, plus
//! acknowledgments.

use chrono::Utc;
use herald_core::delivery::BulkDeliveryReport;
use herald_core::notification::NewNotification;
use herald_core::types::DbId;
use herald_db::models::broadcast::EmergencyBroadcast;
use herald_db::repositories::BroadcastRepo;
use serde_json::json;
use sqlx::PgPool;

use crate::delivery::DeliveryOrchestrator;
use crate::error::{EngineError, EngineResult};
use crate::targets::{bulk_template, resolve_targets};

/// The notification every recipient of `broadcast` receives.
pub fn broadcast_notification(broadcast: &EmergencyBroadcast) -> NewNotification {
    bulk_template(&broadcast.title, &broadcast.body, broadcast.channel_list())
        .with_severity(broadcast.severity())
        .with_branch(broadcast.branch_id)
        .with_metadata(json!({ "broadcast_id": broadcast.id }))
}

#[derive(Clone)]
pub struct BroadcastService {
    pool: PgPool,
    orchestrator: DeliveryOrchestrator,
}

impl BroadcastService {
    pub fn new(pool: PgPool, orchestrator: DeliveryOrchestrator) -> Self {
        Self { pool, orchestrator }
    }

    /// Deliver broadcast `id` to its audience on every listed channel,
    /// bypassing preferences and quiet hours.
    pub async fn send(&self, id: DbId) -> EngineResult<BulkDeliveryReport> {
        let broadcast = BroadcastRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(EngineError::BroadcastNotFound(id))?;
        if broadcast.is_resolved() {
            return Err(EngineError::BroadcastResolved(id));
        }

        let targets =
            resolve_targets(&self.pool, &broadcast.role_list(), &[], broadcast.branch_id).await?;
        let template = broadcast_notification(&broadcast);
        let report = self.orchestrator.notify_users(&targets, &template, true).await;

        let recipients = i32::try_from(targets.len()).unwrap_or(i32::MAX);
        BroadcastRepo::mark_sent(&self.pool, id, Utc::now(), recipients).await?;

        tracing::info!(
            broadcast_id = id,
            total_users = report.total_users,
            delivered_users = report.delivered_users,
            failed_users = report.failed_users.len(),
            "Emergency broadcast sent"
        );
        Ok(report)
    }

    /// Record `user_id`'s acknowledgment. Returns `false` if it was already
    /// recorded.
    pub async fn acknowledge(&self, id: DbId, user_id: DbId) -> EngineResult<bool> {
        if BroadcastRepo::find_by_id(&self.pool, id).await?.is_none() {
            return Err(EngineError::BroadcastNotFound(id));
        }
        let recorded = BroadcastRepo::acknowledge(&self.pool, id, user_id, Utc::now()).await?;
        if recorded {
            tracing::info!(broadcast_id = id, user_id, "Broadcast acknowledged");
        }
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use herald_core::event::Severity;

    use super::*;

    fn broadcast() -> EmergencyBroadcast {
        let now = Utc::now();
        EmergencyBroadcast {
            id: 4,
            title: "Evacuate building B".into(),
            body: "Use the north exits".into(),
            severity: "critical".into(),
            status: "draft".into(),
            channels: json!(["sms", "push", "sms"]),
            target_roles: json!([]),
            branch_id: Some(2),
            sent_at: None,
            resend_interval_minutes: Some(15),
            max_resends: 3,
            resend_count: 0,
            resend_requested_at: None,
            pending_ack_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn notification_carries_broadcast_fields() {
        let n = broadcast_notification(&broadcast());
        assert_eq!(n.title, "Evacuate building B");
        assert_eq!(n.severity, Severity::Critical);
        assert_eq!(n.branch_id, Some(2));
        assert_eq!(n.channels, vec!["sms", "push"]);
        assert_eq!(n.metadata["broadcast_id"], 4);
    }

    #[test]
    fn unknown_severity_is_critical() {
        let mut b = broadcast();
        b.severity = "apocalyptic".into();
        assert_eq!(broadcast_notification(&b).severity, Severity::Critical);
    }
}
