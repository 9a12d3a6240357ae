//! Channel gating and per-channel result aggregation.
//!
//! The delivery orchestrator in `herald-events` performs the I/O; this
//! module decides which channels may be attempted and folds the per-channel
//! outcomes into a notification status and bulk counters.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::channels::Channel;
use crate::notification::NotificationStatus;
use crate::preferences::UserPreferences;
use crate::types::{DbId, Timestamp};

/// Why a channel was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The user disabled the channel.
    ChannelDisabled,
    /// The user is inside their quiet-hours window.
    QuietHours,
    /// No transport is configured for the channel.
    NoTransport,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ChannelDisabled => "channel_disabled",
            SkipReason::QuietHours => "quiet_hours",
            SkipReason::NoTransport => "no_transport",
        }
    }
}

/// Result of one channel for one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "lowercase")]
pub enum ChannelOutcome {
    Sent,
    Failed(String),
    Skipped(SkipReason),
}

impl ChannelOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, ChannelOutcome::Sent)
    }

    /// Short outcome label as stored in `notification_deliveries.outcome`.
    pub fn label(&self) -> &'static str {
        match self {
            ChannelOutcome::Sent => "sent",
            ChannelOutcome::Failed(_) => "failed",
            ChannelOutcome::Skipped(_) => "skipped",
        }
    }

    /// Failure message or skip reason, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ChannelOutcome::Sent => None,
            ChannelOutcome::Failed(e) => Some(e),
            ChannelOutcome::Skipped(r) => Some(r.as_str()),
        }
    }
}

/// Decide whether `channel` may be attempted for a user right now.
///
/// In-app is always allowed. External channels need `bypass_preferences`,
/// or the channel enabled and `now` outside quiet hours. A missing
/// preferences record allows everything.
pub fn gate_channel(
    channel: Channel,
    prefs: Option<&UserPreferences>,
    bypass_preferences: bool,
    now: Timestamp,
) -> Result<(), SkipReason> {
    if !channel.is_external() || bypass_preferences {
        return Ok(());
    }
    let Some(prefs) = prefs else {
        return Ok(());
    };
    if !prefs.channel_enabled(channel) {
        return Err(SkipReason::ChannelDisabled);
    }
    if prefs.in_quiet_hours(now) {
        return Err(SkipReason::QuietHours);
    }
    Ok(())
}

/// One channel's entry in a [`DeliveryReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelReport {
    pub channel: String,
    #[serde(flatten)]
    pub outcome: ChannelOutcome,
    pub completed_at: Timestamp,
}

/// Aggregated result of delivering one notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub notification_id: DbId,
    pub user_id: DbId,
    /// In the order the notification listed its channels.
    pub channels: Vec<ChannelReport>,
    pub status: NotificationStatus,
    /// Completion time of the earliest successful channel.
    pub delivered_at: Option<Timestamp>,
}

impl DeliveryReport {
    pub fn from_channels(notification_id: DbId, user_id: DbId, channels: Vec<ChannelReport>) -> Self {
        let delivered_at = channels
            .iter()
            .filter(|c| c.outcome.is_sent())
            .map(|c| c.completed_at)
            .min();
        let status = if delivered_at.is_some() {
            NotificationStatus::Delivered
        } else {
            NotificationStatus::Failed
        };
        Self {
            notification_id,
            user_id,
            channels,
            status,
            delivered_at,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.status == NotificationStatus::Delivered
    }

    pub fn outcome(&self, channel: &str) -> Option<&ChannelOutcome> {
        self.channels
            .iter()
            .find(|c| c.channel == channel)
            .map(|c| &c.outcome)
    }
}

/// Per-channel counters for bulk sends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelTally {
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Aggregate of a bulk fan-out (announcement, scheduled notification,
/// emergency broadcast).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeliveryReport {
    pub total_users: usize,
    pub delivered_users: usize,
    pub per_channel: BTreeMap<String, ChannelTally>,
    /// Users for whom no channel succeeded.
    pub failed_users: Vec<DbId>,
}

impl BulkDeliveryReport {
    pub fn record(&mut self, report: &DeliveryReport) {
        self.total_users += 1;
        if report.is_delivered() {
            self.delivered_users += 1;
        } else {
            self.failed_users.push(report.user_id);
        }
        for entry in &report.channels {
            let tally = self.per_channel.entry(entry.channel.clone()).or_default();
            match entry.outcome {
                ChannelOutcome::Sent => tally.sent += 1,
                ChannelOutcome::Failed(_) => tally.failed += 1,
                ChannelOutcome::Skipped(_) => tally.skipped += 1,
            }
        }
    }

    /// Count a user whose notification could not even be created.
    pub fn record_unreachable(&mut self, user_id: DbId) {
        self.total_users += 1;
        self.failed_users.push(user_id);
    }
}
