//! Per (user, rule) rate-limit policy.
//!
//! The policy itself is pure: stores count the notifications created for a
//! (user, rule) pair since the cutoffs returned here and pass the counts to
//! [`RateLimitPolicy::check`]. The count and the subsequent insert must run
//! atomically in the store.

use std::fmt;

use chrono::Duration;

use crate::notification::Notification;
use crate::types::Timestamp;

/// Width of the rolling window used by `max_per_hour`.
pub const HOURLY_WINDOW_MINUTES: i64 = 60;

/// Cooldown and hourly-cap settings of a rule.
///
/// Non-positive values are treated as unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitPolicy {
    cooldown_minutes: Option<i32>,
    max_per_hour: Option<i32>,
}

/// Notification counts for one (user, rule) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecentCounts {
    /// Created after [`RateLimitPolicy::cooldown_since`].
    pub within_cooldown: i64,
    /// Created after [`RateLimitPolicy::hourly_since`].
    pub within_hour: i64,
}

/// Why a notification was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleReason {
    Cooldown { minutes: i32 },
    HourlyCap { limit: i32, count: i64 },
}

impl fmt::Display for ThrottleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrottleReason::Cooldown { minutes } => write!(f, "cooldown of {minutes} minutes"),
            ThrottleReason::HourlyCap { limit, count } => {
                write!(f, "hourly cap of {limit} reached ({count} sent)")
            }
        }
    }
}

/// Outcome of the atomic check-then-insert performed by a store.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Created(Notification),
    Throttled(ThrottleReason),
    /// A notification for the same (event, rule, user) already exists.
    Duplicate,
}

impl RateLimitPolicy {
    pub fn new(cooldown_minutes: Option<i32>, max_per_hour: Option<i32>) -> Self {
        Self {
            cooldown_minutes: cooldown_minutes.filter(|m| *m > 0),
            max_per_hour: max_per_hour.filter(|n| *n > 0),
        }
    }

    pub fn cooldown_minutes(&self) -> Option<i32> {
        self.cooldown_minutes
    }

    pub fn max_per_hour(&self) -> Option<i32> {
        self.max_per_hour
    }

    /// A policy with neither setting never throttles.
    pub fn is_unlimited(&self) -> bool {
        self.cooldown_minutes.is_none() && self.max_per_hour.is_none()
    }

    pub fn cooldown_since(&self, now: Timestamp) -> Option<Timestamp> {
        self.cooldown_minutes
            .map(|m| now - Duration::minutes(i64::from(m)))
    }

    pub fn hourly_since(&self, now: Timestamp) -> Option<Timestamp> {
        self.max_per_hour
            .map(|_| now - Duration::minutes(HOURLY_WINDOW_MINUTES))
    }

    /// Decide whether the next notification is suppressed.
    ///
    /// The cooldown is checked first; either check alone throttles.
    pub fn check(&self, counts: RecentCounts) -> Option<ThrottleReason> {
        if let Some(minutes) = self.cooldown_minutes {
            if counts.within_cooldown > 0 {
                return Some(ThrottleReason::Cooldown { minutes });
            }
        }
        if let Some(limit) = self.max_per_hour {
            if counts.within_hour >= i64::from(limit) {
                return Some(ThrottleReason::HourlyCap {
                    limit,
                    count: counts.within_hour,
                });
            }
        }
        None
    }

    /// Count `created` timestamps against both windows.
    ///
    /// Used by stores that keep notifications in memory; SQL stores compute
    /// the same counts with `created_at > $cutoff`.
    pub fn count<I>(&self, created: I, now: Timestamp) -> RecentCounts
    where
        I: IntoIterator<Item = Timestamp>,
    {
        let cooldown_since = self.cooldown_since(now);
        let hourly_since = self.hourly_since(now);
        let mut counts = RecentCounts::default();
        for at in created {
            if cooldown_since.is_some_and(|since| at > since) {
                counts.within_cooldown += 1;
            }
            if hourly_since.is_some_and(|since| at > since) {
                counts.within_hour += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(minute_offset: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(minute_offset)
    }

    #[test]
    fn unset_policy_never_throttles() {
        let policy = RateLimitPolicy::new(None, None);
        assert!(policy.is_unlimited());
        let counts = RecentCounts { within_cooldown: 100, within_hour: 100 };
        assert_eq!(policy.check(counts), None);
    }

    #[test]
    fn non_positive_settings_are_unset() {
        assert!(RateLimitPolicy::new(Some(0), Some(-1)).is_unlimited());
    }

    #[test]
    fn cooldown_suppresses_within_window() {
        let policy = RateLimitPolicy::new(Some(60), None);
        let counts = policy.count([at(0)], at(10));
        assert_matches!(policy.check(counts), Some(ThrottleReason::Cooldown { minutes: 60 }));
    }

    #[test]
    fn cooldown_allows_after_window() {
        let policy = RateLimitPolicy::new(Some(60), None);
        let counts = policy.count([at(0)], at(61));
        assert_eq!(policy.check(counts), None);
    }

    #[test]
    fn hourly_cap_suppresses_fourth() {
        let policy = RateLimitPolicy::new(None, Some(3));
        let sent = [at(0), at(20), at(40)];
        let counts = policy.count(sent, at(59));
        assert_matches!(
            policy.check(counts),
            Some(ThrottleReason::HourlyCap { limit: 3, count: 3 })
        );
    }

    #[test]
    fn hourly_cap_rolls() {
        let policy = RateLimitPolicy::new(None, Some(3));
        let sent = [at(0), at(20), at(40)];
        let counts = policy.count(sent, at(61));
        assert_eq!(counts.within_hour, 2);
        assert_eq!(policy.check(counts), None);
    }

    #[test]
    fn reason_display() {
        assert_eq!(
            ThrottleReason::HourlyCap { limit: 3, count: 4 }.to_string(),
            "hourly cap of 3 reached (4 sent)"
        );
    }
}
