//! Read-only queries against the `users` / `roles` directory.

use herald_core::types::DbId;
use sqlx::PgPool;

use crate::models::user::UserContact;

/// Column list for contact queries.
const CONTACT_COLUMNS: &str = "id, email, phone, device_token, branch_id";

/// Provides recipient lookups.
pub struct UserRepo;

impl UserRepo {
    /// Ids of active users holding one of `roles`, ascending.
    ///
    /// With `branch_id` set only users of that branch are returned; without
    /// it every branch qualifies.
    pub async fn active_ids_by_roles(
        pool: &PgPool,
        roles: &[String],
        branch_id: Option<DbId>,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT DISTINCT u.id FROM users u \
             JOIN roles r ON r.id = u.role_id \
             WHERE u.is_active = true \
               AND r.name = ANY($1) \
               AND ($2::bigint IS NULL OR u.branch_id = $2) \
             ORDER BY u.id ASC",
        )
        .bind(roles)
        .bind(branch_id)
        .fetch_all(pool)
        .await
    }

    /// Ids of every active user, limited to `branch_id` when set.
    pub async fn active_ids(pool: &PgPool, branch_id: Option<DbId>) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM users \
             WHERE is_active = true \
               AND ($1::bigint IS NULL OR branch_id = $1) \
             ORDER BY id ASC",
        )
        .bind(branch_id)
        .fetch_all(pool)
        .await
    }

    /// Keep only the ids in `ids` that belong to active users.
    pub async fn filter_active(pool: &PgPool, ids: &[DbId]) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT id FROM users \
             WHERE is_active = true AND id = ANY($1) \
             ORDER BY id ASC",
        )
        .bind(ids)
        .fetch_all(pool)
        .await
    }

    pub async fn find_contact(pool: &PgPool, user_id: DbId) -> Result<Option<UserContact>, sqlx::Error> {
        let query = format!("SELECT {CONTACT_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, UserContact>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }
}
