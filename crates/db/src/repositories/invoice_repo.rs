//! Read-only invoice queries for the overdue-invoice detector.

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::invoice::OverdueInvoice;

/// Provides overdue scans over `invoices`.
pub struct InvoiceRepo;

impl InvoiceRepo {
    /// Unpaid or partially paid invoices due before `today`.
    pub async fn list_overdue(pool: &PgPool, today: NaiveDate) -> Result<Vec<OverdueInvoice>, sqlx::Error> {
        sqlx::query_as::<_, OverdueInvoice>(
            "SELECT id, number, customer_name, amount_due, due_date, branch_id, created_by \
             FROM invoices \
             WHERE status IN ('unpaid', 'partially_paid') \
               AND due_date < $1 \
             ORDER BY due_date ASC, id ASC",
        )
        .bind(today)
        .fetch_all(pool)
        .await
    }
}
