//! Store implementations over the `herald-db` repositories.

use async_trait::async_trait;
use herald_core::delivery::DeliveryReport;
use herald_core::event::{Event, NewEvent};
use herald_core::notification::{NewNotification, Notification};
use herald_core::preferences::UserPreferences;
use herald_core::rate_limit::{Admission, RateLimitPolicy};
use herald_core::recipient::Recipient;
use herald_core::rules::NotificationRule;
use herald_core::types::{DbId, Timestamp};
use herald_db::repositories::{
    DeliveryRepo, EventRepo, NotificationRepo, PreferenceRepo, RuleRepo, UserRepo,
};
use herald_db::DbPool;

use super::{
    EventStore, NotificationStore, PreferenceStore, RuleStore, StoreResult, UserDirectory,
};

/// PostgreSQL-backed store. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn get(&self, id: DbId) -> StoreResult<Option<Event>> {
        Ok(EventRepo::find_by_id(&self.pool, id).await?.map(Event::from))
    }

    async fn insert(&self, new: NewEvent) -> StoreResult<Option<Event>> {
        Ok(EventRepo::insert(&self.pool, &new).await?.map(Event::from))
    }

    async fn mark_processed(&self, id: DbId, at: Timestamp) -> StoreResult<bool> {
        Ok(EventRepo::mark_processed(&self.pool, id, at).await?)
    }

    async fn list_unprocessed(&self, limit: i64) -> StoreResult<Vec<Event>> {
        let rows = EventRepo::list_unprocessed(&self.pool, limit).await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn last_processed_at(&self) -> StoreResult<Option<Timestamp>> {
        Ok(EventRepo::last_processed_at(&self.pool).await?)
    }
}

#[async_trait]
impl RuleStore for PgStore {
    async fn list_active(&self) -> StoreResult<Vec<NotificationRule>> {
        let rows = RuleRepo::list_active(&self.pool).await?;
        Ok(rows.into_iter().map(NotificationRule::from).collect())
    }

    async fn mark_triggered(&self, rule_id: DbId, at: Timestamp) -> StoreResult<()> {
        Ok(RuleRepo::mark_triggered(&self.pool, rule_id, at).await?)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn create_rate_limited(
        &self,
        new: NewNotification,
        policy: RateLimitPolicy,
        now: Timestamp,
    ) -> StoreResult<Admission> {
        Ok(NotificationRepo::create_rate_limited(&self.pool, &new, policy, now).await?)
    }

    async fn create(&self, new: NewNotification, now: Timestamp) -> StoreResult<Option<Notification>> {
        Ok(NotificationRepo::create(&self.pool, &new, now)
            .await?
            .map(Notification::from))
    }

    async fn pending_for_rule(&self, event_id: DbId, rule_id: DbId) -> StoreResult<Vec<Notification>> {
        let rows = NotificationRepo::list_pending_for_rule(&self.pool, event_id, rule_id).await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn record_delivery(&self, report: &DeliveryReport) -> StoreResult<()> {
        Ok(DeliveryRepo::record_report(&self.pool, report).await?)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn active_user_ids(&self, roles: &[String], branch_id: Option<DbId>) -> StoreResult<Vec<DbId>> {
        Ok(UserRepo::active_ids_by_roles(&self.pool, roles, branch_id).await?)
    }

    async fn contact(&self, user_id: DbId) -> StoreResult<Option<Recipient>> {
        Ok(UserRepo::find_contact(&self.pool, user_id)
            .await?
            .map(Recipient::from))
    }
}

#[async_trait]
impl PreferenceStore for PgStore {
    async fn preferences(&self, user_id: DbId) -> StoreResult<Option<UserPreferences>> {
        Ok(PreferenceRepo::find_for_user(&self.pool, user_id)
            .await?
            .map(UserPreferences::from))
    }
}
