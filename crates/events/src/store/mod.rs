//! Storage seams used by the engine.
//!
//! Every component talks to storage through the traits here, never to
//! `herald-db` directly. [`postgres::PgStore`] implements all of them over
//! the repositories; [`memory::MemoryStore`] implements them in process for
//! tests and embedding.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use herald_core::delivery::DeliveryReport;
use herald_core::event::{Event, NewEvent};
use herald_core::notification::{NewNotification, Notification};
use herald_core::preferences::UserPreferences;
use herald_core::rate_limit::{Admission, RateLimitPolicy};
use herald_core::recipient::Recipient;
use herald_core::rules::NotificationRule;
use herald_core::types::{DbId, Timestamp};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A transient storage failure. Callers log it and retry on the next notice
/// or tick.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn get(&self, id: DbId) -> StoreResult<Option<Event>>;

    /// Insert an event. `None` means the idempotency key already exists.
    async fn insert(&self, new: NewEvent) -> StoreResult<Option<Event>>;

    /// Set `processed_at` if unset, clamped to `occurred_at`. Returns `true`
    /// if this call set it.
    async fn mark_processed(&self, id: DbId, at: Timestamp) -> StoreResult<bool>;

    /// Unprocessed events, oldest first.
    async fn list_unprocessed(&self, limit: i64) -> StoreResult<Vec<Event>>;

    async fn last_processed_at(&self) -> StoreResult<Option<Timestamp>>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules ordered `priority DESC, id ASC`.
    async fn list_active(&self) -> StoreResult<Vec<NotificationRule>>;

    async fn mark_triggered(&self, rule_id: DbId, at: Timestamp) -> StoreResult<()>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Count recent notifications for `(new.user_id, new.rule_id)`, apply
    /// `policy`, and insert, atomically with respect to other callers for
    /// the same pair.
    async fn create_rate_limited(
        &self,
        new: NewNotification,
        policy: RateLimitPolicy,
        now: Timestamp,
    ) -> StoreResult<Admission>;

    /// Insert without rate limiting. `None` means a duplicate.
    async fn create(&self, new: NewNotification, now: Timestamp) -> StoreResult<Option<Notification>>;

    /// Notifications produced for `(event_id, rule_id)` that are still
    /// `pending`, i.e. created but never delivered.
    async fn pending_for_rule(&self, event_id: DbId, rule_id: DbId) -> StoreResult<Vec<Notification>>;

    /// Persist per-channel results and the notification's final status.
    async fn record_delivery(&self, report: &DeliveryReport) -> StoreResult<()>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Active users with a role in `roles`, in `branch_id` when set.
    /// Ascending and de-duplicated.
    async fn active_user_ids(&self, roles: &[String], branch_id: Option<DbId>) -> StoreResult<Vec<DbId>>;

    async fn contact(&self, user_id: DbId) -> StoreResult<Option<Recipient>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// `None` when the user never saved preferences.
    async fn preferences(&self, user_id: DbId) -> StoreResult<Option<UserPreferences>>;
}

/// The full set of stores the engine is wired with.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub rules: Arc<dyn RuleStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub users: Arc<dyn UserDirectory>,
    pub preferences: Arc<dyn PreferenceStore>,
}

impl Stores {
    /// Back every store with one shared implementation.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: EventStore + RuleStore + NotificationStore + UserDirectory + PreferenceStore + 'static,
    {
        Self {
            events: store.clone(),
            rules: store.clone(),
            notifications: store.clone(),
            users: store.clone(),
            preferences: store,
        }
    }
}
