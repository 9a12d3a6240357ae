//! Per-user channel preferences and quiet hours.

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::channels::Channel;
use crate::types::{DbId, Timestamp};

/// A user's delivery preferences.
///
/// When a user has no stored preferences every channel is allowed and there
/// are no quiet hours; use [`UserPreferences::allow_all`] for that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: DbId,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub sms_enabled: bool,
    pub chat_enabled: bool,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    /// Offset of the user's wall clock from UTC, used for quiet hours.
    pub utc_offset_minutes: i32,
}

impl UserPreferences {
    pub fn allow_all(user_id: DbId) -> Self {
        Self {
            user_id,
            email_enabled: true,
            push_enabled: true,
            sms_enabled: true,
            chat_enabled: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
            utc_offset_minutes: 0,
        }
    }

    pub fn channel_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::InApp => true,
            Channel::Email => self.email_enabled,
            Channel::Push => self.push_enabled,
            Channel::Sms => self.sms_enabled,
            Channel::Chat => self.chat_enabled,
        }
    }

    /// The user's local wall-clock time at `now`.
    pub fn local_time(&self, now: Timestamp) -> NaiveTime {
        match FixedOffset::east_opt(self.utc_offset_minutes * 60) {
            Some(offset) => now.with_timezone(&offset).time(),
            None => now.time(),
        }
    }

    /// Whether `now` falls in the configured quiet-hours window.
    ///
    /// A window needs both ends set.
    pub fn in_quiet_hours(&self, now: Timestamp) -> bool {
        match (self.quiet_hours_start, self.quiet_hours_end) {
            (Some(start), Some(end)) => in_quiet_window(start, end, self.local_time(now)),
            _ => false,
        }
    }
}

/// Inclusive window test that wraps midnight when `start > end`.
pub fn in_quiet_window(start: NaiveTime, end: NaiveTime, now: NaiveTime) -> bool {
    if start > end {
        now >= start || now <= end
    } else {
        start <= now && now <= end
    }
}
