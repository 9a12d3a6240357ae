//! Event types, idempotency keys and thresholds for the periodic detectors.

use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::event::Severity;
use crate::types::DbId;

pub const MODULE_INVENTORY: &str = "inventory";
pub const MODULE_INVOICING: &str = "invoicing";

pub const EVENT_STOCK_LOW: &str = "stock.low";
pub const EVENT_INVOICE_OVERDUE: &str = "invoice.overdue";

/// Invoices overdue by more than this many days are raised as critical.
pub const OVERDUE_CRITICAL_DAYS: i64 = 30;

/// Key that makes a detector emit at most one event per entity per day.
///
/// Format: `<event_type>:<entity_id>:<YYYY-MM-DD>`.
pub fn idempotency_key(event_type: &str, entity_id: DbId, day: NaiveDate) -> String {
    format!("{event_type}:{entity_id}:{day}")
}

/// At or below the reorder level but not yet out of stock.
pub fn is_low_stock(on_hand: i64, reorder_level: i64) -> bool {
    on_hand > 0 && on_hand <= reorder_level
}

pub fn days_overdue(due: NaiveDate, today: NaiveDate) -> i64 {
    (today - due).num_days().max(0)
}

pub fn overdue_severity(days: i64) -> Severity {
    if days > OVERDUE_CRITICAL_DAYS {
        Severity::Critical
    } else {
        Severity::Warning
    }
}

/// Payload of a `stock.low` event.
pub fn stock_low_payload(
    product_id: DbId,
    name: &str,
    sku: Option<&str>,
    on_hand: i64,
    reorder_level: i64,
) -> Value {
    json!({
        "product_id": product_id,
        "product_name": name,
        "sku": sku,
        "current_stock": on_hand,
        "min_quantity": reorder_level,
    })
}

/// Payload of an `invoice.overdue` event.
pub fn invoice_overdue_payload(
    invoice_id: DbId,
    number: &str,
    customer_name: &str,
    amount_due: f64,
    due_date: NaiveDate,
    days: i64,
) -> Value {
    json!({
        "invoice_id": invoice_id,
        "invoice_number": number,
        "customer_name": customer_name,
        "amount_due": amount_due,
        "due_date": due_date.to_string(),
        "days_overdue": days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn key_is_stable_per_day() {
        assert_eq!(idempotency_key(EVENT_STOCK_LOW, 42, day(1)), "stock.low:42:2026-03-01");
        assert_ne!(
            idempotency_key(EVENT_STOCK_LOW, 42, day(1)),
            idempotency_key(EVENT_STOCK_LOW, 42, day(2))
        );
    }

    #[test]
    fn low_stock_excludes_out_of_stock() {
        assert!(is_low_stock(3, 10));
        assert!(is_low_stock(10, 10));
        assert!(!is_low_stock(11, 10));
        assert!(!is_low_stock(0, 10));
    }

    #[test]
    fn overdue_days_and_severity() {
        assert_eq!(days_overdue(day(1), day(5)), 4);
        assert_eq!(days_overdue(day(5), day(1)), 0);
        assert_eq!(overdue_severity(4), Severity::Warning);
        assert_eq!(overdue_severity(31), Severity::Critical);
    }

    #[test]
    fn stock_payload_shape() {
        let p = stock_low_payload(42, "Widget", None, 3, 10);
        assert_eq!(p["product_id"], 42);
        assert_eq!(p["current_stock"], 3);
        assert!(p["sku"].is_null());
    }
}
