//! Per-recipient rate limiting.

use std::sync::Arc;

use herald_core::notification::NewNotification;
use herald_core::rate_limit::Admission;
use herald_core::rules::NotificationRule;
use herald_core::types::Timestamp;

use crate::store::{NotificationStore, StoreResult};

/// Applies a rule's cooldown and hourly cap to one recipient at a time.
///
/// The count and insert run as one store operation, so concurrent workers
/// handling the same (user, rule) pair cannot both pass.
#[derive(Clone)]
pub struct RateLimiter {
    notifications: Arc<dyn NotificationStore>,
}

impl RateLimiter {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }

    /// Create `new` unless `rule` throttles its recipient at `now`.
    pub async fn admit(
        &self,
        new: NewNotification,
        rule: &NotificationRule,
        now: Timestamp,
    ) -> StoreResult<Admission> {
        let policy = rule.rate_limit();
        let user_id = new.user_id;
        let admission = self.notifications.create_rate_limited(new, policy, now).await?;
        if let Admission::Throttled(reason) = &admission {
            tracing::debug!(rule_id = rule.id, user_id, reason = %reason, "Notification throttled");
        }
        Ok(admission)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone, Utc};
    use herald_core::rate_limit::ThrottleReason;

    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::rule;

    fn at(minute: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn notification(rule: &NotificationRule, user_id: i64) -> NewNotification {
        let mut new = NewNotification::new(user_id, "Low stock", "");
        new.rule_id = Some(rule.id);
        new
    }

    #[tokio::test]
    async fn cooldown_ten_minutes_apart_is_suppressed() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let rule = NotificationRule {
            cooldown_minutes: Some(60),
            ..rule(1, "stock.*")
        };
        assert_matches!(limiter.admit(notification(&rule, 5), &rule, at(0)).await.unwrap(), Admission::Created(_));
        assert_matches!(
            limiter.admit(notification(&rule, 5), &rule, at(10)).await.unwrap(),
            Admission::Throttled(ThrottleReason::Cooldown { minutes: 60 })
        );
    }

    #[tokio::test]
    async fn cooldown_sixty_one_minutes_apart_proceeds() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let rule = NotificationRule {
            cooldown_minutes: Some(60),
            ..rule(1, "stock.*")
        };
        assert_matches!(limiter.admit(notification(&rule, 5), &rule, at(0)).await.unwrap(), Admission::Created(_));
        assert_matches!(limiter.admit(notification(&rule, 5), &rule, at(61)).await.unwrap(), Admission::Created(_));
    }

    #[tokio::test]
    async fn fourth_within_hour_is_capped_regardless_of_spacing() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let rule = NotificationRule {
            max_per_hour: Some(3),
            ..rule(1, "stock.*")
        };
        for minute in [0, 1, 2] {
            assert_matches!(
                limiter.admit(notification(&rule, 5), &rule, at(minute)).await.unwrap(),
                Admission::Created(_)
            );
        }
        assert_matches!(
            limiter.admit(notification(&rule, 5), &rule, at(50)).await.unwrap(),
            Admission::Throttled(ThrottleReason::HourlyCap { limit: 3, .. })
        );
        // Entries older than the trailing hour no longer count.
        assert_matches!(limiter.admit(notification(&rule, 5), &rule, at(61)).await.unwrap(), Admission::Created(_));
    }

    #[tokio::test]
    async fn unlimited_rule_never_throttles() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let rule = rule(1, "stock.*");
        for minute in 0..10 {
            assert_matches!(
                limiter.admit(notification(&rule, 5), &rule, at(minute)).await.unwrap(),
                Admission::Created(_)
            );
        }
    }

    #[tokio::test]
    async fn concurrent_admissions_pass_cooldown_once() {
        let limiter = RateLimiter::new(Arc::new(MemoryStore::new()));
        let rule = NotificationRule {
            cooldown_minutes: Some(60),
            ..rule(1, "stock.*")
        };
        let attempts = (0..8).map(|_| {
            let limiter = limiter.clone();
            let rule = rule.clone();
            tokio::spawn(async move { limiter.admit(notification(&rule, 5), &rule, at(0)).await })
        });
        let results = futures::future::join_all(attempts).await;
        let created = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(Admission::Created(_)))))
            .count();
        assert_eq!(created, 1);
    }
}
