//! Read-only view of the user directory.

use herald_core::recipient::Recipient;
use herald_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// Contact columns of a `users` row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserContact {
    pub id: DbId,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub device_token: Option<String>,
    pub branch_id: Option<DbId>,
}

impl From<UserContact> for Recipient {
    fn from(row: UserContact) -> Self {
        Recipient {
            user_id: row.id,
            email: row.email,
            phone: row.phone,
            device_token: row.device_token,
            branch_id: row.branch_id,
        }
    }
}
