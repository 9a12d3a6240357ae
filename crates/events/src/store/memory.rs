//! In-process store.
//!
//! A single mutex guards all state and is held for the whole of each
//! operation, so `create_rate_limited` is atomic the same way the Postgres
//! transaction is. Seeding helpers let tests build a directory and rule set.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use herald_core::delivery::DeliveryReport;
use herald_core::event::{Event, NewEvent};
use herald_core::notification::{NewNotification, Notification, NotificationStatus};
use herald_core::preferences::UserPreferences;
use herald_core::rate_limit::{Admission, RateLimitPolicy};
use herald_core::recipient::Recipient;
use herald_core::rules::{priority_order, NotificationRule};
use herald_core::types::{DbId, Timestamp};

use super::{
    EventStore, NotificationStore, PreferenceStore, RuleStore, StoreError, StoreResult,
    UserDirectory,
};

#[derive(Debug, Clone)]
struct DirectoryEntry {
    role: String,
    is_active: bool,
    contact: Recipient,
}

#[derive(Default)]
struct State {
    next_event_id: DbId,
    next_notification_id: DbId,
    events: BTreeMap<DbId, Event>,
    rules: Vec<NotificationRule>,
    notifications: Vec<Notification>,
    deliveries: Vec<DeliveryReport>,
    users: BTreeMap<DbId, DirectoryEntry>,
    preferences: HashMap<DbId, UserPreferences>,
    unavailable: bool,
}

/// Mutex-guarded in-memory implementation of every store trait.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_available(&self) -> StoreResult<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(state)
    }

    // -- seeding ------------------------------------------------------------

    pub fn add_rule(&self, rule: NotificationRule) {
        self.lock().rules.push(rule);
    }

    /// Register an active user with a role, branch and contact details.
    pub fn add_user(&self, contact: Recipient, role: &str) {
        self.lock().users.insert(
            contact.user_id,
            DirectoryEntry {
                role: role.to_string(),
                is_active: true,
                contact,
            },
        );
    }

    pub fn deactivate_user(&self, user_id: DbId) {
        if let Some(entry) = self.lock().users.get_mut(&user_id) {
            entry.is_active = false;
        }
    }

    pub fn set_preferences(&self, prefs: UserPreferences) {
        self.lock().preferences.insert(prefs.user_id, prefs);
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    // -- inspection -----------------------------------------------------------

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.values().cloned().collect()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn deliveries(&self) -> Vec<DeliveryReport> {
        self.lock().deliveries.clone()
    }

    pub fn rule(&self, rule_id: DbId) -> Option<NotificationRule> {
        self.lock().rules.iter().find(|r| r.id == rule_id).cloned()
    }
}

impl State {
    fn is_duplicate(&self, new: &NewNotification) -> bool {
        match (new.event_id, new.rule_id) {
            (Some(event_id), Some(rule_id)) => self.notifications.iter().any(|n| {
                n.event_id == Some(event_id) && n.rule_id == Some(rule_id) && n.user_id == new.user_id
            }),
            _ => false,
        }
    }

    fn push_notification(&mut self, new: NewNotification, now: Timestamp) -> Notification {
        self.next_notification_id += 1;
        let notification = new.into_notification(self.next_notification_id, now);
        self.notifications.push(notification.clone());
        notification
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn get(&self, id: DbId) -> StoreResult<Option<Event>> {
        Ok(self.lock_available()?.events.get(&id).cloned())
    }

    async fn insert(&self, new: NewEvent) -> StoreResult<Option<Event>> {
        let mut state = self.lock_available()?;
        if let Some(key) = &new.idempotency_key {
            if state
                .events
                .values()
                .any(|e| e.idempotency_key.as_deref() == Some(key.as_str()))
            {
                return Ok(None);
            }
        }
        state.next_event_id += 1;
        let event = new.into_event(state.next_event_id, chrono::Utc::now());
        state.events.insert(event.id, event.clone());
        Ok(Some(event))
    }

    async fn mark_processed(&self, id: DbId, at: Timestamp) -> StoreResult<bool> {
        let mut state = self.lock_available()?;
        match state.events.get_mut(&id) {
            Some(event) if event.processed_at.is_none() => {
                event.processed_at = Some(at.max(event.occurred_at));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_unprocessed(&self, limit: i64) -> StoreResult<Vec<Event>> {
        let state = self.lock_available()?;
        Ok(state
            .events
            .values()
            .filter(|e| e.processed_at.is_none())
            .take(usize::try_from(limit).unwrap_or(0))
            .cloned()
            .collect())
    }

    async fn last_processed_at(&self) -> StoreResult<Option<Timestamp>> {
        let state = self.lock_available()?;
        Ok(state.events.values().filter_map(|e| e.processed_at).max())
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn list_active(&self) -> StoreResult<Vec<NotificationRule>> {
        let state = self.lock_available()?;
        let mut rules: Vec<_> = state.rules.iter().filter(|r| r.is_active).cloned().collect();
        rules.sort_by(priority_order);
        Ok(rules)
    }

    async fn mark_triggered(&self, rule_id: DbId, at: Timestamp) -> StoreResult<()> {
        let mut state = self.lock_available()?;
        if let Some(rule) = state.rules.iter_mut().find(|r| r.id == rule_id) {
            rule.last_triggered_at = Some(rule.last_triggered_at.map_or(at, |prev| prev.max(at)));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn create_rate_limited(
        &self,
        new: NewNotification,
        policy: RateLimitPolicy,
        now: Timestamp,
    ) -> StoreResult<Admission> {
        let mut state = self.lock_available()?;
        if state.is_duplicate(&new) {
            return Ok(Admission::Duplicate);
        }
        if let Some(rule_id) = new.rule_id {
            let created = state
                .notifications
                .iter()
                .filter(|n| n.user_id == new.user_id && n.rule_id == Some(rule_id))
                .map(|n| n.created_at);
            if let Some(reason) = policy.check(policy.count(created, now)) {
                return Ok(Admission::Throttled(reason));
            }
        }
        Ok(Admission::Created(state.push_notification(new, now)))
    }

    async fn create(&self, new: NewNotification, now: Timestamp) -> StoreResult<Option<Notification>> {
        let mut state = self.lock_available()?;
        if state.is_duplicate(&new) {
            return Ok(None);
        }
        Ok(Some(state.push_notification(new, now)))
    }

    async fn pending_for_rule(&self, event_id: DbId, rule_id: DbId) -> StoreResult<Vec<Notification>> {
        let state = self.lock_available()?;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.event_id == Some(event_id) && n.rule_id == Some(rule_id))
            .filter(|n| n.status == NotificationStatus::Pending)
            .cloned()
            .collect())
    }

    async fn record_delivery(&self, report: &DeliveryReport) -> StoreResult<()> {
        let mut state = self.lock_available()?;
        if let Some(n) = state
            .notifications
            .iter_mut()
            .find(|n| n.id == report.notification_id)
        {
            n.status = report.status;
            n.delivered_at = report.delivered_at;
        }
        state.deliveries.push(report.clone());
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn active_user_ids(&self, roles: &[String], branch_id: Option<DbId>) -> StoreResult<Vec<DbId>> {
        let state = self.lock_available()?;
        Ok(state
            .users
            .iter()
            .filter(|(_, u)| u.is_active && roles.contains(&u.role))
            .filter(|(_, u)| branch_id.is_none() || u.contact.branch_id == branch_id)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn contact(&self, user_id: DbId) -> StoreResult<Option<Recipient>> {
        let state = self.lock_available()?;
        Ok(state.users.get(&user_id).map(|u| u.contact.clone()))
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn preferences(&self, user_id: DbId) -> StoreResult<Option<UserPreferences>> {
        Ok(self.lock_available()?.preferences.get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};
    use herald_core::rate_limit::ThrottleReason;

    use super::*;

    fn rule_notification(rule_id: DbId, user_id: DbId) -> NewNotification {
        let mut new = NewNotification::new(user_id, "t", "b");
        new.rule_id = Some(rule_id);
        new
    }

    #[tokio::test]
    async fn idempotency_key_deduplicates() {
        let store = MemoryStore::new();
        let new = NewEvent::new("inventory", "stock.low").with_idempotency_key("k");
        assert!(store.insert(new.clone()).await.unwrap().is_some());
        assert!(store.insert(new).await.unwrap().is_none());
        assert_eq!(store.events().len(), 1);
    }

    #[tokio::test]
    async fn processed_at_clamped_and_set_once() {
        let store = MemoryStore::new();
        let event = store
            .insert(NewEvent::new("inventory", "stock.low"))
            .await
            .unwrap()
            .unwrap();
        let early = event.occurred_at - Duration::hours(1);
        assert!(store.mark_processed(event.id, early).await.unwrap());
        assert!(!store.mark_processed(event.id, Utc::now()).await.unwrap());
        let stored = store.get(event.id).await.unwrap().unwrap();
        assert_eq!(stored.processed_at, Some(event.occurred_at));
    }

    #[tokio::test]
    async fn hourly_cap_counts_within_window() {
        let store = MemoryStore::new();
        let policy = RateLimitPolicy::new(None, Some(3));
        let start = Utc::now();
        for minute in [0, 20, 40] {
            let admission = store
                .create_rate_limited(rule_notification(1, 5), policy, start + Duration::minutes(minute))
                .await
                .unwrap();
            assert_matches!(admission, Admission::Created(_));
        }
        let fourth = store
            .create_rate_limited(rule_notification(1, 5), policy, start + Duration::minutes(59))
            .await
            .unwrap();
        assert_matches!(fourth, Admission::Throttled(ThrottleReason::HourlyCap { limit: 3, count: 3 }));

        // A different user is counted separately.
        let other = store
            .create_rate_limited(rule_notification(1, 6), policy, start + Duration::minutes(59))
            .await
            .unwrap();
        assert_matches!(other, Admission::Created(_));
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert_matches!(store.list_active().await, Err(StoreError::Unavailable(_)));
    }
}
