//! Audience selection for bulk sends (broadcasts, announcements, scheduled
//! notifications).

use herald_core::channels::{ordered_channel_set, CHANNEL_IN_APP};
use herald_core::notification::NewNotification;
use herald_core::recipient::normalize_user_ids;
use herald_core::types::DbId;
use herald_db::repositories::UserRepo;
use sqlx::PgPool;

/// Active users addressed by `roles` and `user_ids`, scoped to `branch_id`.
///
/// Explicit ids are filtered to active users. With neither roles nor ids,
/// every active user of the branch (or of all branches) is targeted.
pub async fn resolve_targets(
    pool: &PgPool,
    roles: &[String],
    user_ids: &[DbId],
    branch_id: Option<DbId>,
) -> Result<Vec<DbId>, sqlx::Error> {
    if roles.is_empty() && user_ids.is_empty() {
        return UserRepo::active_ids(pool, branch_id).await;
    }
    let mut targets = Vec::new();
    if !roles.is_empty() {
        targets.extend(UserRepo::active_ids_by_roles(pool, roles, branch_id).await?);
    }
    if !user_ids.is_empty() {
        targets.extend(UserRepo::filter_active(pool, user_ids).await?);
    }
    Ok(normalize_user_ids(targets))
}

/// Channel list for a bulk send; defaults to in-app only.
pub fn bulk_channels(requested: Vec<String>) -> Vec<String> {
    let channels = ordered_channel_set(requested);
    if channels.is_empty() {
        vec![CHANNEL_IN_APP.to_string()]
    } else {
        channels
    }
}

/// Per-user copy of a bulk notification.
///
/// The user id is a placeholder; the orchestrator sets it per recipient.
pub fn bulk_template(title: &str, body: &str, channels: Vec<String>) -> NewNotification {
    NewNotification::new(0, title, body).with_channels(bulk_channels(channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_default_to_in_app() {
        assert_eq!(bulk_channels(vec![]), vec!["in_app"]);
        assert_eq!(
            bulk_channels(vec!["sms".into(), "in_app".into(), "sms".into()]),
            vec!["sms", "in_app"]
        );
    }

    #[test]
    fn template_carries_channels() {
        let t = bulk_template("Drill", "At 3pm", vec!["push".into()]);
        assert_eq!(t.title, "Drill");
        assert_eq!(t.channels, vec!["push"]);
        assert!(t.event_id.is_none());
    }
}
