//! Low-stock detector.
//!
//! Scans active products at or below their reorder level and emits one
//! `stock.low` event per product per day. The daily idempotency key makes
//! repeated scans within the same day no-ops.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use herald_core::detectors::{
    idempotency_key, is_low_stock, stock_low_payload, EVENT_STOCK_LOW, MODULE_INVENTORY,
};
use herald_core::event::{NewEvent, Severity};
use herald_db::models::inventory::ProductStock;
use herald_db::repositories::InventoryRepo;
use sqlx::PgPool;

use super::{PeriodicJob, Schedule};
use crate::error::EngineResult;
use crate::intake::{EventIntake, Submission};

/// The `stock.low` event for `product` on `today`.
pub fn stock_low_event(product: &ProductStock, today: NaiveDate) -> NewEvent {
    NewEvent::new(MODULE_INVENTORY, EVENT_STOCK_LOW)
        .with_severity(Severity::Warning)
        .with_branch(product.branch_id)
        .with_payload(stock_low_payload(
            product.id,
            &product.name,
            product.sku.as_deref(),
            product.quantity_on_hand,
            product.reorder_level,
        ))
        .with_idempotency_key(idempotency_key(EVENT_STOCK_LOW, product.id, today))
}

pub struct LowStockDetector {
    pool: PgPool,
    intake: EventIntake,
    interval: Duration,
}

impl LowStockDetector {
    pub fn new(pool: PgPool, intake: EventIntake, interval: Duration) -> Self {
        Self {
            pool,
            intake,
            interval,
        }
    }
}

#[async_trait]
impl PeriodicJob for LowStockDetector {
    fn name(&self) -> &'static str {
        "low_stock_detector"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.interval)
    }

    async fn run_once(&self) -> EngineResult<usize> {
        let products = InventoryRepo::list_low_stock(&self.pool).await?;
        let today = Utc::now().date_naive();

        let mut emitted = 0;
        for product in products
            .iter()
            .filter(|p| is_low_stock(p.quantity_on_hand, p.reorder_level))
        {
            if let Submission::Accepted(event) = self.intake.submit(stock_low_event(product, today)).await? {
                tracing::info!(
                    event_id = event.id,
                    product_id = product.id,
                    on_hand = product.quantity_on_hand,
                    "Low stock detected"
                );
                emitted += 1;
            }
        }
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_is_keyed_per_product_and_day() {
        let product = ProductStock {
            id: 42,
            name: "Widget".into(),
            sku: Some("W-1".into()),
            quantity_on_hand: 3,
            reorder_level: 10,
            branch_id: Some(2),
        };
        let today = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let event = stock_low_event(&product, today);

        assert_eq!(event.event_type, "stock.low");
        assert_eq!(event.source_module, "inventory");
        assert_eq!(event.branch_id, Some(2));
        assert_eq!(event.idempotency_key.as_deref(), Some("stock.low:42:2026-03-01"));
        assert_eq!(event.payload["current_stock"], 3);
        assert_eq!(event.payload["sku"], "W-1");
        assert!(event.validate().is_ok());
    }
}
