//! Product stock levels scanned by the low-stock detector.

use herald_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// Stock columns of a `products` row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ProductStock {
    pub id: DbId,
    pub name: String,
    pub sku: Option<String>,
    pub quantity_on_hand: i64,
    pub reorder_level: i64,
    pub branch_id: Option<DbId>,
}
