//! Recipient resolver.

use std::sync::Arc;

use herald_core::event::Event;
use herald_core::recipient::{normalize_user_ids, Audience};
use herald_core::types::DbId;

use crate::store::{StoreResult, UserDirectory};

/// Turns a rule's `recipient_roles` into concrete user ids.
#[derive(Clone)]
pub struct RecipientResolver {
    users: Arc<dyn UserDirectory>,
}

impl RecipientResolver {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// Users to notify for `event`, ascending and de-duplicated.
    ///
    /// With no roles the event's own `user_id` is the only recipient, if it
    /// has one. With roles, active holders of any of them are returned,
    /// scoped to the event's branch unless the event has none.
    pub async fn resolve(&self, roles: Vec<String>, event: &Event) -> StoreResult<Vec<DbId>> {
        match Audience::for_event(roles, event) {
            Audience::Actor(user_id) => Ok(user_id.into_iter().collect()),
            Audience::Roles { roles, branch_id } => {
                let ids = self.users.active_user_ids(&roles, branch_id).await?;
                Ok(normalize_user_ids(ids))
            }
        }
    }
}
