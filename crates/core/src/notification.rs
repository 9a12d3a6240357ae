//! Materialised, per-user notifications.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::CHANNEL_IN_APP;
use crate::event::{Event, Severity};
use crate::template::NotificationContent;
use crate::types::{DbId, Timestamp};

/// Delivery status of a notification.
///
/// `Pending` until the orchestrator has run; then `Delivered` if at least one
/// channel succeeded, otherwise `Failed` (nothing attempted, or every
/// channel failed or was suppressed).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Delivered,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(NotificationStatus::Pending),
            "delivered" => Some(NotificationStatus::Delivered),
            "failed" => Some(NotificationStatus::Failed),
            _ => None,
        }
    }
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: DbId,
    /// Set for rule-generated notifications; `None` for bulk sends.
    pub event_id: Option<DbId>,
    pub rule_id: Option<DbId>,
    pub user_id: DbId,
    pub branch_id: Option<DbId>,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub metadata: Value,
    /// Ordered set of requested channel names.
    pub channels: Vec<String>,
    pub status: NotificationStatus,
    pub created_at: Timestamp,
    pub delivered_at: Option<Timestamp>,
}

/// Insert payload for a notification.
///
/// Built with [`NewNotification::new`] and the `with_*` methods, or from a
/// rule firing with [`NewNotification::for_rule`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub event_id: Option<DbId>,
    pub rule_id: Option<DbId>,
    pub user_id: DbId,
    pub branch_id: Option<DbId>,
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub metadata: Value,
    pub channels: Vec<String>,
}

impl NewNotification {
    /// A plain in-app notification for `user_id`.
    pub fn new(user_id: DbId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            event_id: None,
            rule_id: None,
            user_id,
            branch_id: None,
            title: title.into(),
            body: body.into(),
            severity: Severity::Info,
            action_url: None,
            action_label: None,
            metadata: Value::Object(Default::default()),
            channels: vec![CHANNEL_IN_APP.to_string()],
        }
    }

    /// The notification produced when rule `rule_id` fires on `event` for
    /// `user_id`.
    pub fn for_rule(event: &Event, rule_id: DbId, user_id: DbId, content: NotificationContent) -> Self {
        Self {
            event_id: Some(event.id),
            rule_id: Some(rule_id),
            user_id,
            branch_id: event.branch_id,
            title: content.title,
            body: content.body,
            severity: content.severity,
            action_url: content.action_url,
            action_label: content.action_label,
            metadata: content.metadata,
            channels: content.channels,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_branch(mut self, branch_id: Option<DbId>) -> Self {
        self.branch_id = branch_id;
        self
    }

    pub fn with_channels(mut self, channels: Vec<String>) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Materialise as a pending notification. Used by in-memory stores.
    pub fn into_notification(self, id: DbId, created_at: Timestamp) -> Notification {
        Notification {
            id,
            event_id: self.event_id,
            rule_id: self.rule_id,
            user_id: self.user_id,
            branch_id: self.branch_id,
            title: self.title,
            body: self.body,
            severity: self.severity,
            action_url: self.action_url,
            action_label: self.action_label,
            metadata: self.metadata,
            channels: self.channels,
            status: NotificationStatus::Pending,
            created_at,
            delivered_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::event::test_support::stock_low_event;

    #[test]
    fn for_rule_copies_event_scope() {
        let event = stock_low_event();
        let content = NotificationContent {
            title: "t".into(),
            body: "b".into(),
            severity: Severity::Critical,
            action_url: None,
            action_label: Some("Open".into()),
            metadata: json!({"k": 1}),
            channels: vec!["in_app".into(), "email".into()],
        };
        let n = NewNotification::for_rule(&event, 9, 100, content);
        assert_eq!(n.event_id, Some(7));
        assert_eq!(n.rule_id, Some(9));
        assert_eq!(n.branch_id, Some(2));
        assert_eq!(n.severity, Severity::Critical);
        assert_eq!(n.channels, vec!["in_app", "email"]);
    }

    #[test]
    fn builder_defaults_to_in_app() {
        let n = NewNotification::new(1, "Hello", "World")
            .with_severity(Severity::Warning)
            .with_branch(Some(3));
        assert_eq!(n.channels, vec!["in_app"]);
        assert_eq!(n.branch_id, Some(3));
        assert!(n.event_id.is_none());
    }

    #[test]
    fn status_parse_round_trip() {
        for s in [
            NotificationStatus::Pending,
            NotificationStatus::Delivered,
            NotificationStatus::Failed,
        ] {
            assert_eq!(NotificationStatus::parse(s.as_str()), Some(s));
        }
    }
}
