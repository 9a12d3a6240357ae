//! Repository integration tests.
//!
//! Each test gets a fresh database from `#[sqlx::test]`, created on the
//! server named by `DATABASE_URL`.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use herald_core::delivery::{ChannelOutcome, ChannelReport, DeliveryReport};
use herald_core::event::NewEvent;
use herald_core::notification::NewNotification;
use herald_core::rate_limit::{Admission, RateLimitPolicy, ThrottleReason};
use herald_core::types::{DbId, Timestamp};
use herald_db::repositories::{
    AnnouncementRepo, BroadcastRepo, DeliveryRepo, EventRepo, InventoryRepo, InvoiceRepo, NotificationRepo,
    ScheduledNotificationRepo, UserRepo,
};
use serde_json::json;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(minute: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
}

async fn seed_rule(pool: &PgPool) -> DbId {
    sqlx::query_scalar(
        "INSERT INTO notification_rules (name, event_type_pattern) VALUES ('r', 'stock.*') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_event(pool: &PgPool) -> DbId {
    EventRepo::insert(pool, &NewEvent::new("inventory", "stock.low"))
        .await
        .unwrap()
        .unwrap()
        .id
}

async fn seed_user(pool: &PgPool, username: &str, role: &str, branch: Option<DbId>, active: bool) -> DbId {
    let role_id: DbId = sqlx::query_scalar(
        "INSERT INTO roles (name) VALUES ($1) \
         ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
    )
    .bind(role)
    .fetch_one(pool)
    .await
    .unwrap();
    sqlx::query_scalar(
        "INSERT INTO users (username, role_id, branch_id, is_active) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(username)
    .bind(role_id)
    .bind(branch)
    .bind(active)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn rule_notification(event_id: Option<DbId>, rule_id: DbId, user_id: DbId) -> NewNotification {
    let mut new = NewNotification::new(user_id, "Low stock", "Product 42");
    new.event_id = event_id;
    new.rule_id = Some(rule_id);
    new
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn idempotency_key_deduplicates_events(pool: PgPool) {
    let new = NewEvent::new("inventory", "stock.low").with_idempotency_key("stock.low:42:2026-03-01");
    let first = EventRepo::insert(&pool, &new).await.unwrap();
    let second = EventRepo::insert(&pool, &new).await.unwrap();
    assert!(first.is_some());
    assert!(second.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn processed_at_is_set_once(pool: PgPool) {
    let id = seed_event(&pool).await;
    let now = Utc::now();
    assert!(EventRepo::mark_processed(&pool, id, now).await.unwrap());
    assert!(!EventRepo::mark_processed(&pool, id, now + Duration::minutes(5)).await.unwrap());

    let row = EventRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(row.processed_at.unwrap() >= row.occurred_at);
    assert!(EventRepo::list_unprocessed(&pool, 10).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Rate-limited inserts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn cooldown_suppresses_second_notification(pool: PgPool) {
    let rule_id = seed_rule(&pool).await;
    let user_id = seed_user(&pool, "wm", "warehouse_manager", None, true).await;
    let policy = RateLimitPolicy::new(Some(60), None);

    let first = NotificationRepo::create_rate_limited(&pool, &rule_notification(None, rule_id, user_id), policy, at(0))
        .await
        .unwrap();
    assert!(matches!(first, Admission::Created(_)));

    let second = NotificationRepo::create_rate_limited(&pool, &rule_notification(None, rule_id, user_id), policy, at(10))
        .await
        .unwrap();
    assert_eq!(second, Admission::Throttled(ThrottleReason::Cooldown { minutes: 60 }));

    let later = NotificationRepo::create_rate_limited(&pool, &rule_notification(None, rule_id, user_id), policy, at(61))
        .await
        .unwrap();
    assert!(matches!(later, Admission::Created(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn same_event_rule_user_is_duplicate(pool: PgPool) {
    let rule_id = seed_rule(&pool).await;
    let event_id = seed_event(&pool).await;
    let user_id = seed_user(&pool, "wm", "warehouse_manager", None, true).await;
    let new = rule_notification(Some(event_id), rule_id, user_id);

    let first = NotificationRepo::create_rate_limited(&pool, &new, RateLimitPolicy::default(), at(0))
        .await
        .unwrap();
    let again = NotificationRepo::create_rate_limited(&pool, &new, RateLimitPolicy::default(), at(1))
        .await
        .unwrap();
    assert!(matches!(first, Admission::Created(_)));
    assert_eq!(again, Admission::Duplicate);
    assert_eq!(NotificationRepo::list_for_event(&pool, event_id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_inserts_respect_cooldown(pool: PgPool) {
    let rule_id = seed_rule(&pool).await;
    let user_id = seed_user(&pool, "wm", "warehouse_manager", None, true).await;
    let policy = RateLimitPolicy::new(Some(60), None);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            let new = rule_notification(None, rule_id, user_id);
            tokio::spawn(async move { NotificationRepo::create_rate_limited(&pool, &new, policy, at(0)).await })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            Admission::Created(_) => created += 1,
            Admission::Throttled(reason) => assert_eq!(reason, ThrottleReason::Cooldown { minutes: 60 }),
            Admission::Duplicate => panic!("no event id, so nothing can be a duplicate"),
        }
    }
    assert_eq!(created, 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE rule_id = $1")
        .bind(rule_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn recorded_delivery_clears_pending(pool: PgPool) {
    let rule_id = seed_rule(&pool).await;
    let event_id = seed_event(&pool).await;
    let user_id = seed_user(&pool, "wm", "warehouse_manager", None, true).await;
    let row = NotificationRepo::create(&pool, &rule_notification(Some(event_id), rule_id, user_id), at(0))
        .await
        .unwrap()
        .unwrap();

    let pending = NotificationRepo::list_pending_for_rule(&pool, event_id, rule_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, row.id);

    let report = DeliveryReport::from_channels(
        row.id,
        user_id,
        vec![
            ChannelReport {
                channel: "in_app".into(),
                outcome: ChannelOutcome::Sent,
                completed_at: at(1),
            },
            ChannelReport {
                channel: "email".into(),
                outcome: ChannelOutcome::Failed("smtp refused".into()),
                completed_at: at(1),
            },
        ],
    );
    DeliveryRepo::record_report(&pool, &report).await.unwrap();

    assert!(NotificationRepo::list_pending_for_rule(&pool, event_id, rule_id)
        .await
        .unwrap()
        .is_empty());
    let stored = NotificationRepo::list_for_event(&pool, event_id).await.unwrap();
    assert_eq!(stored[0].status, "delivered");

    let deliveries = DeliveryRepo::list_for_notification(&pool, row.id).await.unwrap();
    let outcomes: Vec<_> = deliveries
        .iter()
        .map(|d| (d.channel.as_str(), d.outcome.as_str(), d.detail.as_deref()))
        .collect();
    assert_eq!(
        outcomes,
        vec![("in_app", "sent", None), ("email", "failed", Some("smtp refused"))]
    );
}

// ---------------------------------------------------------------------------
// Retention
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn retention_deletes_only_old_read_and_processed_rows(pool: PgPool) {
    let now = Utc::now();
    let old_event = seed_event(&pool).await;
    let recent_event = seed_event(&pool).await;
    let _unprocessed = seed_event(&pool).await;
    sqlx::query("UPDATE events SET occurred_at = $2, processed_at = $2 WHERE id = $1")
        .bind(old_event)
        .bind(now - Duration::days(120))
        .execute(&pool)
        .await
        .unwrap();
    EventRepo::mark_processed(&pool, recent_event, now).await.unwrap();

    let user_id = seed_user(&pool, "a", "staff", None, true).await;
    let mut ids = Vec::new();
    for _ in 0..3 {
        let row = NotificationRepo::create(&pool, &NewNotification::new(user_id, "Hi", ""), now)
            .await
            .unwrap()
            .unwrap();
        ids.push(row.id);
    }
    // Read long ago, read recently, never read.
    for (id, read_at) in [(ids[0], now - Duration::days(40)), (ids[1], now - Duration::days(1))] {
        sqlx::query("UPDATE notifications SET is_read = true, read_at = $2 WHERE id = $1")
            .bind(id)
            .bind(read_at)
            .execute(&pool)
            .await
            .unwrap();
    }

    let cutoff = now - Duration::days(30);
    assert_eq!(NotificationRepo::delete_read_before(&pool, cutoff).await.unwrap(), 1);
    assert_eq!(EventRepo::delete_processed_before(&pool, cutoff).await.unwrap(), 1);

    let left: Vec<DbId> = sqlx::query_scalar("SELECT id FROM notifications ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(left, vec![ids[1], ids[2]]);
    assert!(EventRepo::find_by_id(&pool, old_event).await.unwrap().is_none());
    assert!(EventRepo::find_by_id(&pool, recent_event).await.unwrap().is_some());
    assert_eq!(EventRepo::list_unprocessed(&pool, 10).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn role_lookup_respects_branch_and_activity(pool: PgPool) {
    let a = seed_user(&pool, "a", "warehouse_manager", Some(1), true).await;
    let b = seed_user(&pool, "b", "warehouse_manager", Some(2), true).await;
    let _inactive = seed_user(&pool, "c", "warehouse_manager", Some(1), false).await;
    let _other_role = seed_user(&pool, "d", "cashier", Some(1), true).await;
    let roles = vec!["warehouse_manager".to_string()];

    assert_eq!(UserRepo::active_ids_by_roles(&pool, &roles, Some(1)).await.unwrap(), vec![a]);
    assert_eq!(UserRepo::active_ids_by_roles(&pool, &roles, None).await.unwrap(), vec![a, b]);
}

// ---------------------------------------------------------------------------
// Broadcasts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn acknowledgment_is_recorded_once(pool: PgPool) {
    let user_id = seed_user(&pool, "a", "staff", None, true).await;
    let id: DbId = sqlx::query_scalar(
        "INSERT INTO emergency_broadcasts (title, target_roles) VALUES ('Fire drill', $1) RETURNING id",
    )
    .bind(json!(["staff"]))
    .fetch_one(&pool)
    .await
    .unwrap();
    BroadcastRepo::mark_sent(&pool, id, Utc::now(), 1).await.unwrap();

    assert!(BroadcastRepo::acknowledge(&pool, id, user_id, Utc::now()).await.unwrap());
    assert!(!BroadcastRepo::acknowledge(&pool, id, user_id, Utc::now()).await.unwrap());

    let broadcast = BroadcastRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(broadcast.pending_ack_count, 0);
    assert_eq!(broadcast.status, "active");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn resend_is_flagged_once_per_interval(pool: PgPool) {
    let a = seed_user(&pool, "a", "staff", None, true).await;
    let _b = seed_user(&pool, "b", "staff", None, true).await;
    let _other = seed_user(&pool, "c", "cashier", None, true).await;
    let id: DbId = sqlx::query_scalar(
        "INSERT INTO emergency_broadcasts (title, target_roles, resend_interval_minutes, max_resends) \
         VALUES ('Evacuate', $1, 5, 1) RETURNING id",
    )
    .bind(json!(["staff"]))
    .fetch_one(&pool)
    .await
    .unwrap();
    BroadcastRepo::mark_sent(&pool, id, at(0), 2).await.unwrap();
    BroadcastRepo::acknowledge(&pool, id, a, at(1)).await.unwrap();

    assert!(BroadcastRepo::flag_resends(&pool, at(4)).await.unwrap().is_empty());

    let flags = BroadcastRepo::flag_resends(&pool, at(5)).await.unwrap();
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].id, id);
    assert!(flags[0].flagged);
    assert_eq!(flags[0].pending_ack_count, 1);
    assert_eq!(flags[0].resend_count, 1);

    // max_resends reached.
    assert!(BroadcastRepo::flag_resends(&pool, at(30)).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Scheduled notifications and announcements
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn scheduled_run_is_claimed_once(pool: PgPool) {
    let id: DbId = sqlx::query_scalar(
        "INSERT INTO scheduled_notifications (title, recurrence, next_run_at) \
         VALUES ('Stocktake', 'daily', $1) RETURNING id",
    )
    .bind(at(0))
    .fetch_one(&pool)
    .await
    .unwrap();

    let due = ScheduledNotificationRepo::list_due(&pool, at(1), 10).await.unwrap();
    assert_eq!(due.len(), 1);

    let next = at(0) + Duration::days(1);
    assert!(ScheduledNotificationRepo::claim_run(&pool, id, at(0), Some(next), at(1)).await.unwrap());
    assert!(!ScheduledNotificationRepo::claim_run(&pool, id, at(0), Some(next), at(1)).await.unwrap());

    let row = ScheduledNotificationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(row.next_run_at, Some(next));
    assert_eq!(row.last_run_at, Some(at(1)));
    assert_eq!(row.run_count, 1);
    assert!(row.is_active);
    assert!(ScheduledNotificationRepo::list_due(&pool, at(1), 10).await.unwrap().is_empty());

    assert!(ScheduledNotificationRepo::claim_run(&pool, id, next, None, next).await.unwrap());
    let row = ScheduledNotificationRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(!row.is_active);
    assert_eq!(row.run_count, 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn announcement_is_published_once(pool: PgPool) {
    let due: DbId = sqlx::query_scalar(
        "INSERT INTO announcements (title, status, publish_at) VALUES ('Holiday hours', 'scheduled', $1) RETURNING id",
    )
    .bind(at(0))
    .fetch_one(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO announcements (title, status, publish_at) VALUES ('Later', 'scheduled', $1)")
        .bind(at(60))
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO announcements (title, publish_at) VALUES ('Draft', $1)")
        .bind(at(0))
        .execute(&pool)
        .await
        .unwrap();

    let listed: Vec<_> = AnnouncementRepo::list_due(&pool, at(5)).await.unwrap().iter().map(|a| a.id).collect();
    assert_eq!(listed, vec![due]);

    assert!(AnnouncementRepo::mark_published(&pool, due, at(5)).await.unwrap());
    assert!(!AnnouncementRepo::mark_published(&pool, due, at(6)).await.unwrap());
    assert!(AnnouncementRepo::list_due(&pool, at(5)).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Detector scans
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn low_stock_scan_skips_empty_inactive_and_healthy(pool: PgPool) {
    sqlx::query(
        "INSERT INTO products (name, quantity_on_hand, reorder_level, is_active) VALUES \
            ('low', 3, 10, true), \
            ('at level', 10, 10, true), \
            ('out', 0, 10, true), \
            ('healthy', 50, 10, true), \
            ('retired', 2, 10, false)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let names: Vec<_> = InventoryRepo::list_low_stock(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["low", "at level"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn overdue_scan_matches_open_invoices_past_due(pool: PgPool) {
    sqlx::query(
        "INSERT INTO invoices (number, customer_name, amount_due, due_date, status) VALUES \
            ('INV-1', 'Acme', 100, '2026-02-01', 'unpaid'), \
            ('INV-2', 'Acme', 50, '2026-02-15', 'partially_paid'), \
            ('INV-3', 'Acme', 70, '2026-02-01', 'paid'), \
            ('INV-4', 'Acme', 80, '2026-03-01', 'unpaid'), \
            ('INV-5', 'Acme', 90, '2026-03-05', 'unpaid')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
    let numbers: Vec<_> = InvoiceRepo::list_overdue(&pool, today)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.number)
        .collect();
    assert_eq!(numbers, vec!["INV-1", "INV-2"]);
}
