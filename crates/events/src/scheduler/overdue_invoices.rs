//! Overdue-invoice detector.
//!
//! Emits one `invoice.overdue` event per unpaid invoice per day. Invoices
//! more than 30 days late are raised as critical.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use herald_core::detectors::{
    days_overdue, idempotency_key, invoice_overdue_payload, overdue_severity,
    EVENT_INVOICE_OVERDUE, MODULE_INVOICING,
};
use herald_core::event::NewEvent;
use herald_db::models::invoice::OverdueInvoice;
use herald_db::repositories::InvoiceRepo;
use sqlx::PgPool;

use super::{PeriodicJob, Schedule};
use crate::error::EngineResult;
use crate::intake::{EventIntake, Submission};

/// The `invoice.overdue` event for `invoice` on `today`.
///
/// The invoice's creator is carried as the event user, so rules without
/// recipient roles notify them.
pub fn invoice_overdue_event(invoice: &OverdueInvoice, today: NaiveDate) -> NewEvent {
    let days = days_overdue(invoice.due_date, today);
    NewEvent::new(MODULE_INVOICING, EVENT_INVOICE_OVERDUE)
        .with_severity(overdue_severity(days))
        .with_branch(invoice.branch_id)
        .with_user(invoice.created_by)
        .with_payload(invoice_overdue_payload(
            invoice.id,
            &invoice.number,
            &invoice.customer_name,
            invoice.amount_due,
            invoice.due_date,
            days,
        ))
        .with_idempotency_key(idempotency_key(EVENT_INVOICE_OVERDUE, invoice.id, today))
}

pub struct OverdueInvoiceDetector {
    pool: PgPool,
    intake: EventIntake,
    interval: Duration,
}

impl OverdueInvoiceDetector {
    pub fn new(pool: PgPool, intake: EventIntake, interval: Duration) -> Self {
        Self {
            pool,
            intake,
            interval,
        }
    }
}

#[async_trait]
impl PeriodicJob for OverdueInvoiceDetector {
    fn name(&self) -> &'static str {
        "overdue_invoice_detector"
    }

    fn schedule(&self) -> Schedule {
        Schedule::Every(self.interval)
    }

    async fn run_once(&self) -> EngineResult<usize> {
        let today = Utc::now().date_naive();
        let invoices = InvoiceRepo::list_overdue(&self.pool, today).await?;

        let mut emitted = 0;
        for invoice in &invoices {
            if let Submission::Accepted(event) =
                self.intake.submit(invoice_overdue_event(invoice, today)).await?
            {
                tracing::info!(
                    event_id = event.id,
                    invoice_id = invoice.id,
                    severity = event.severity.as_str(),
                    "Overdue invoice detected"
                );
                emitted += 1;
            }
        }
        Ok(emitted)
    }
}
