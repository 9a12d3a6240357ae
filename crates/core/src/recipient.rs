//! Recipient targeting and contact details.

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::types::DbId;

/// Contact details a channel transport needs to reach one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: DbId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub device_token: Option<String>,
    pub branch_id: Option<DbId>,
}

impl Recipient {
    /// A recipient with no contact details. Only in-app delivery can reach it.
    pub fn bare(user_id: DbId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}

/// Who a rule firing should notify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// No roles configured: the user carried on the event, if any.
    Actor(Option<DbId>),
    /// Active users holding one of `roles`, limited to `branch_id` when set.
    Roles {
        roles: Vec<String>,
        branch_id: Option<DbId>,
    },
}

impl Audience {
    /// Derive the audience from a rule's `recipient_roles` and the event scope.
    pub fn for_event(roles: Vec<String>, event: &Event) -> Self {
        if roles.is_empty() {
            Audience::Actor(event.user_id)
        } else {
            Audience::Roles {
                roles,
                branch_id: event.branch_id,
            }
        }
    }
}

/// Sort ascending and drop duplicates.
pub fn normalize_user_ids(mut ids: Vec<DbId>) -> Vec<DbId> {
    ids.sort_unstable();
    ids.dedup();
    ids
}
