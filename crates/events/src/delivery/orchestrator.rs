//! Per-notification and bulk delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{join_all, BoxFuture};
use futures::{FutureExt, StreamExt};
use herald_core::channels::Channel;
use herald_core::delivery::{
    gate_channel, BulkDeliveryReport, ChannelOutcome, ChannelReport, DeliveryReport, SkipReason,
};
use herald_core::notification::{NewNotification, Notification};
use herald_core::preferences::UserPreferences;
use herald_core::recipient::Recipient;
use herald_core::types::{DbId, Timestamp};

use super::Transports;
use crate::config::EngineConfig;
use crate::store::{NotificationStore, PreferenceStore, Stores, UserDirectory};

/// Fans a notification out over its requested channels.
///
/// External channels run concurrently, each in its own task bounded by
/// `channel_timeout`. A channel that errors, hangs or panics only fails
/// itself.
#[derive(Clone)]
pub struct DeliveryOrchestrator {
    notifications: Arc<dyn NotificationStore>,
    users: Arc<dyn UserDirectory>,
    preferences: Arc<dyn PreferenceStore>,
    transports: Transports,
    channel_timeout: Duration,
    bulk_concurrency: usize,
}

/// What the orchestrator knows about the user before any channel runs.
struct Audience {
    recipient: Recipient,
    preferences: Result<Option<UserPreferences>, String>,
}

impl DeliveryOrchestrator {
    pub fn new(stores: &Stores, transports: Transports, config: &EngineConfig) -> Self {
        Self {
            notifications: Arc::clone(&stores.notifications),
            users: Arc::clone(&stores.users),
            preferences: Arc::clone(&stores.preferences),
            transports,
            channel_timeout: config.channel_timeout,
            bulk_concurrency: config.bulk_concurrency.max(1),
        }
    }

    /// Deliver `notification` and persist the per-channel results.
    ///
    /// `bypass_preferences` ignores disabled channels and quiet hours.
    pub async fn deliver(&self, notification: &Notification, bypass_preferences: bool) -> DeliveryReport {
        let now = Utc::now();
        let needs_lookup = notification
            .channels
            .iter()
            .any(|name| Channel::parse(name).is_some_and(Channel::is_external));
        let audience = if needs_lookup {
            Some(self.lookup(notification.user_id).await)
        } else {
            None
        };
        let notification = Arc::new(notification.clone());

        let attempts: Vec<BoxFuture<'static, ChannelReport>> = notification
            .channels
            .iter()
            .map(|name| self.attempt(name, &notification, audience.as_ref(), bypass_preferences, now))
            .collect();
        let channels = join_all(attempts).await;

        let report = DeliveryReport::from_channels(notification.id, notification.user_id, channels);
        if let Err(e) = self.notifications.record_delivery(&report).await {
            tracing::error!(
                notification_id = report.notification_id,
                error = %e,
                "Failed to record delivery results"
            );
        }
        tracing::debug!(
            notification_id = report.notification_id,
            user_id = report.user_id,
            status = report.status.as_str(),
            "Notification delivered"
        );
        report
    }

    /// Create one notification per user from `template` and deliver each.
    ///
    /// Users are processed `bulk_concurrency` at a time. A user whose
    /// notification cannot be created counts as failed.
    pub async fn notify_users(
        &self,
        user_ids: &[DbId],
        template: &NewNotification,
        bypass_preferences: bool,
    ) -> BulkDeliveryReport {
        let now = Utc::now();
        let results: Vec<(DbId, Option<DeliveryReport>)> = futures::stream::iter(user_ids.iter().copied())
            .map(|user_id| {
                let new = NewNotification {
                    user_id,
                    ..template.clone()
                };
                async move { (user_id, self.create_and_deliver(new, bypass_preferences, now).await) }
            })
            .buffer_unordered(self.bulk_concurrency)
            .collect()
            .await;

        let mut bulk = BulkDeliveryReport::default();
        for (user_id, report) in results {
            match report {
                Some(report) => bulk.record(&report),
                None => bulk.record_unreachable(user_id),
            }
        }
        bulk.failed_users.sort_unstable();
        bulk
    }

    /// Deliver already-persisted notifications.
    pub async fn deliver_bulk(&self, notifications: &[Notification], bypass_preferences: bool) -> BulkDeliveryReport {
        let reports: Vec<DeliveryReport> = futures::stream::iter(notifications.iter().cloned())
            .map(|n| async move { self.deliver(&n, bypass_preferences).await })
            .buffer_unordered(self.bulk_concurrency)
            .collect()
            .await;

        let mut bulk = BulkDeliveryReport::default();
        for report in &reports {
            bulk.record(report);
        }
        bulk.failed_users.sort_unstable();
        bulk
    }

    async fn create_and_deliver(
        &self,
        new: NewNotification,
        bypass_preferences: bool,
        now: Timestamp,
    ) -> Option<DeliveryReport> {
        let user_id = new.user_id;
        match self.notifications.create(new, now).await {
            Ok(Some(notification)) => Some(self.deliver(&notification, bypass_preferences).await),
            Ok(None) => {
                tracing::debug!(user_id, "Bulk notification already exists");
                None
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to create bulk notification");
                None
            }
        }
    }

    async fn lookup(&self, user_id: DbId) -> Audience {
        let recipient = match self.users.contact(user_id).await {
            Ok(Some(recipient)) => recipient,
            Ok(None) => Recipient::bare(user_id),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Contact lookup failed");
                Recipient::bare(user_id)
            }
        };
        let preferences = self.preferences.preferences(user_id).await.map_err(|e| {
            tracing::warn!(user_id, error = %e, "Preference lookup failed");
            format!("preferences unavailable: {e}")
        });
        Audience {
            recipient,
            preferences,
        }
    }

    /// Resolve one channel to either an immediate outcome or a spawned send.
    fn attempt(
        &self,
        name: &str,
        notification: &Arc<Notification>,
        audience: Option<&Audience>,
        bypass_preferences: bool,
        now: Timestamp,
    ) -> BoxFuture<'static, ChannelReport> {
        let channel_name = name.to_string();
        let settled = |outcome: ChannelOutcome| {
            let report = ChannelReport {
                channel: channel_name.clone(),
                outcome,
                completed_at: Utc::now(),
            };
            async move { report }.boxed()
        };

        let Some(channel) = Channel::parse(name) else {
            tracing::warn!(notification_id = notification.id, channel = name, "Unknown channel");
            return settled(ChannelOutcome::Failed(format!("unknown channel {name:?}")));
        };
        if channel == Channel::InApp {
            return settled(ChannelOutcome::Sent);
        }
        let Some(audience) = audience else {
            return settled(ChannelOutcome::Failed("recipient not resolved".into()));
        };

        let prefs = match &audience.preferences {
            Ok(prefs) => prefs.as_ref(),
            Err(e) if !bypass_preferences => return settled(ChannelOutcome::Failed(e.clone())),
            Err(_) => None,
        };
        if let Err(reason) = gate_channel(channel, prefs, bypass_preferences, now) {
            return settled(ChannelOutcome::Skipped(reason));
        }
        let Some(transport) = self.transports.get(channel) else {
            return settled(ChannelOutcome::Skipped(SkipReason::NoTransport));
        };

        let recipient = audience.recipient.clone();
        let sent = Arc::clone(notification);
        let timeout = self.channel_timeout;
        let handle = tokio::spawn(async move {
            tokio::time::timeout(timeout, transport.send(&recipient, &sent)).await
        });

        let notification_id = notification.id;
        let user_id = notification.user_id;
        async move {
            let outcome = match handle.await {
                Ok(Ok(Ok(()))) => ChannelOutcome::Sent,
                Ok(Ok(Err(e))) => ChannelOutcome::Failed(e.to_string()),
                Ok(Err(_)) => ChannelOutcome::Failed(format!("timed out after {}s", timeout.as_secs_f32())),
                Err(e) if e.is_panic() => ChannelOutcome::Failed("transport panicked".into()),
                Err(_) => ChannelOutcome::Failed("send cancelled".into()),
            };
            if let ChannelOutcome::Failed(error) = &outcome {
                tracing::warn!(
                    notification_id,
                    user_id,
                    channel = %channel,
                    error = error.as_str(),
                    "Channel delivery failed"
                );
            }
            ChannelReport {
                channel: channel_name,
                outcome,
                completed_at: Utc::now(),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{NaiveTime, Timelike};
    use herald_core::notification::NotificationStatus;

    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{Behavior, FakeTransport};

    fn contact(user_id: DbId) -> Recipient {
        Recipient {
            email: Some(format!("user{user_id}@example.com")),
            phone: Some("+15550100".into()),
            device_token: Some(format!("tok-{user_id}")),
            ..Recipient::bare(user_id)
        }
    }

    fn orchestrator(store: &Arc<MemoryStore>, transports: Transports) -> DeliveryOrchestrator {
        let config = EngineConfig {
            channel_timeout: Duration::from_millis(200),
            bulk_concurrency: 4,
            ..EngineConfig::default()
        };
        DeliveryOrchestrator::new(&Stores::from_shared(Arc::clone(store)), transports, &config)
    }

    async fn persisted(store: &MemoryStore, user_id: DbId, channels: &[&str]) -> Notification {
        let new = NewNotification::new(user_id, "Low stock", "Widget: 3 left")
            .with_channels(channels.iter().map(|c| c.to_string()).collect());
        store.create(new, Utc::now()).await.unwrap().unwrap()
    }

    /// A quiet-hours window that contains the current UTC time.
    fn quiet_now(user_id: DbId) -> UserPreferences {
        let hour = Utc::now().hour();
        let mut prefs = UserPreferences::allow_all(user_id);
        prefs.quiet_hours_start = NaiveTime::from_hms_opt((hour + 23) % 24, 0, 0);
        prefs.quiet_hours_end = NaiveTime::from_hms_opt((hour + 1) % 24, 59, 0);
        prefs
    }

    #[tokio::test]
    async fn delivered_when_only_push_succeeds() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(contact(1), "manager");
        let transports = Transports::new()
            .with(FakeTransport::new(Channel::Email, Behavior::Fail))
            .with(FakeTransport::new(Channel::Push, Behavior::Succeed))
            .with(FakeTransport::new(Channel::Sms, Behavior::Fail));
        let n = persisted(&store, 1, &["email", "push", "sms"]).await;

        let report = orchestrator(&store, transports).deliver(&n, false).await;

        assert_eq!(report.status, NotificationStatus::Delivered);
        assert!(report.delivered_at.is_some());
        assert_eq!(report.outcome("push"), Some(&ChannelOutcome::Sent));
        assert_matches!(report.outcome("email"), Some(ChannelOutcome::Failed(_)));
        let channels: Vec<_> = report.channels.iter().map(|c| c.channel.as_str()).collect();
        assert_eq!(channels, vec!["email", "push", "sms"]);

        let stored = store.notifications();
        assert_eq!(stored[0].status, NotificationStatus::Delivered);
        assert_eq!(store.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn quiet_hours_skip_external_but_not_in_app() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(contact(1), "manager");
        store.set_preferences(quiet_now(1));
        let email = FakeTransport::new(Channel::Email, Behavior::Succeed);
        let n = persisted(&store, 1, &["in_app", "email"]).await;

        let report = orchestrator(&store, Transports::new().with(email.clone()))
            .deliver(&n, false)
            .await;

        assert_eq!(report.outcome("email"), Some(&ChannelOutcome::Skipped(SkipReason::QuietHours)));
        assert_eq!(report.outcome("in_app"), Some(&ChannelOutcome::Sent));
        assert!(report.is_delivered());
        assert_eq!(email.calls(), 0);
    }

    #[tokio::test]
    async fn all_channels_skipped_is_undelivered() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(contact(1), "manager");
        let mut prefs = UserPreferences::allow_all(1);
        prefs.email_enabled = false;
        store.set_preferences(prefs);
        let n = persisted(&store, 1, &["email", "sms"]).await;

        let report = orchestrator(&store, Transports::new()).deliver(&n, false).await;

        assert_eq!(report.outcome("email"), Some(&ChannelOutcome::Skipped(SkipReason::ChannelDisabled)));
        assert_eq!(report.outcome("sms"), Some(&ChannelOutcome::Skipped(SkipReason::NoTransport)));
        assert_eq!(report.status, NotificationStatus::Failed);
    }

    #[tokio::test]
    async fn bypass_ignores_quiet_hours() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(contact(1), "manager");
        store.set_preferences(quiet_now(1));
        let sms = FakeTransport::new(Channel::Sms, Behavior::Succeed);
        let n = persisted(&store, 1, &["sms"]).await;

        let report = orchestrator(&store, Transports::new().with(sms.clone()))
            .deliver(&n, true)
            .await;

        assert_eq!(report.outcome("sms"), Some(&ChannelOutcome::Sent));
        assert_eq!(sms.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_channel_times_out_alone() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(contact(1), "manager");
        let transports = Transports::new()
            .with(FakeTransport::new(Channel::Email, Behavior::Hang))
            .with(FakeTransport::new(Channel::Push, Behavior::Succeed));
        let n = persisted(&store, 1, &["email", "push"]).await;

        let report = orchestrator(&store, transports).deliver(&n, false).await;

        assert_matches!(report.outcome("email"), Some(ChannelOutcome::Failed(e)) if e.starts_with("timed out"));
        assert_eq!(report.outcome("push"), Some(&ChannelOutcome::Sent));
        assert!(report.is_delivered());
    }

    #[tokio::test]
    async fn panicking_channel_is_isolated() {
        let store = Arc::new(MemoryStore::new());
        store.add_user(contact(1), "manager");
        let transports = Transports::new()
            .with(FakeTransport::new(Channel::Chat, Behavior::Panic))
            .with(FakeTransport::new(Channel::Email, Behavior::Succeed));
        let n = persisted(&store, 1, &["chat", "email"]).await;

        let report = orchestrator(&store, transports).deliver(&n, false).await;

        assert_eq!(
            report.outcome("chat"),
            Some(&ChannelOutcome::Failed("transport panicked".into()))
        );
        assert_eq!(report.outcome("email"), Some(&ChannelOutcome::Sent));
    }

    #[tokio::test]
    async fn unknown_channel_fails_only_itself() {
        let store = Arc::new(MemoryStore::new());
        let n = persisted(&store, 1, &["pager", "in_app"]).await;

        let report = orchestrator(&store, Transports::new()).deliver(&n, false).await;

        assert_matches!(report.outcome("pager"), Some(ChannelOutcome::Failed(_)));
        assert_eq!(report.outcome("in_app"), Some(&ChannelOutcome::Sent));
        assert!(report.is_delivered());
    }

    #[tokio::test]
    async fn notify_users_tallies_bulk_results() {
        let store = Arc::new(MemoryStore::new());
        for id in [1, 2, 3] {
            store.add_user(contact(id), "staff");
        }
        let mut prefs = UserPreferences::allow_all(2);
        prefs.email_enabled = false;
        store.set_preferences(prefs);
        let template = NewNotification::new(0, "Stocktake", "Counts due Friday")
            .with_channels(vec!["email".into()]);
        let email = FakeTransport::new(Channel::Email, Behavior::Succeed);
        let orchestrator = orchestrator(&store, Transports::new().with(email.clone()));

        let bulk = orchestrator.notify_users(&[1, 2, 3], &template, false).await;

        assert_eq!(bulk.total_users, 3);
        assert_eq!(bulk.delivered_users, 2);
        assert_eq!(bulk.failed_users, vec![2]);
        assert_eq!(bulk.per_channel["email"].sent, 2);
        assert_eq!(bulk.per_channel["email"].skipped, 1);
        assert_eq!(email.calls(), 2);
        assert!(store.notifications().iter().all(|n| n.title == "Stocktake"));
    }

    #[tokio::test]
    async fn notify_users_counts_store_failures_as_unreachable() {
        let store = Arc::new(MemoryStore::new());
        let orchestrator = orchestrator(&store, Transports::new());
        store.set_unavailable(true);

        let bulk = orchestrator
            .notify_users(&[5, 6], &NewNotification::new(0, "Hi", ""), false)
            .await;
        assert_eq!(bulk.total_users, 2);
        assert_eq!(bulk.failed_users, vec![5, 6]);
        assert!(bulk.per_channel.is_empty());
    }

    #[tokio::test]
    async fn deliver_bulk_runs_on_a_spawned_task() {
        let store = Arc::new(MemoryStore::new());
        for id in [1, 2] {
            store.add_user(contact(id), "staff");
        }
        let mut notifications = Vec::new();
        for id in [1, 2] {
            notifications.push(persisted(&store, id, &["in_app", "push"]).await);
        }
        let orchestrator = orchestrator(&store, Transports::new().with(FakeTransport::new(Channel::Push, Behavior::Fail)));

        let bulk = tokio::spawn(async move { orchestrator.deliver_bulk(&notifications, false).await })
            .await
            .unwrap();

        assert_eq!(bulk.total_users, 2);
        assert_eq!(bulk.delivered_users, 2);
        assert_eq!(bulk.per_channel["push"].failed, 2);
        assert!(store
            .notifications()
            .iter()
            .all(|n| n.status == NotificationStatus::Delivered));
    }
}
