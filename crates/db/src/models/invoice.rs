//! Unpaid invoices scanned by the overdue-invoice detector.

use chrono::NaiveDate;
use herald_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// Billing columns of an `invoices` row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OverdueInvoice {
    pub id: DbId,
    pub number: String,
    pub customer_name: String,
    pub amount_due: f64,
    pub due_date: NaiveDate,
    pub branch_id: Option<DbId>,
    pub created_by: Option<DbId>,
}
