//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument.

pub mod announcement_repo;
pub mod broadcast_repo;
pub mod delivery_repo;
pub mod event_repo;
pub mod inventory_repo;
pub mod invoice_repo;
pub mod notification_repo;
pub mod preference_repo;
pub mod rule_repo;
pub mod scheduled_notification_repo;
pub mod user_repo;

pub use announcement_repo::AnnouncementRepo;
pub use broadcast_repo::BroadcastRepo;
pub use delivery_repo::DeliveryRepo;
pub use event_repo::EventRepo;
pub use inventory_repo::InventoryRepo;
pub use invoice_repo::InvoiceRepo;
pub use notification_repo::NotificationRepo;
pub use preference_repo::PreferenceRepo;
pub use rule_repo::RuleRepo;
pub use scheduled_notification_repo::ScheduledNotificationRepo;
pub use user_repo::UserRepo;
