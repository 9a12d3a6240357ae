//! Read-only stock queries for the low-stock detector.

use sqlx::PgPool;

use crate::models::inventory::ProductStock;

/// Provides stock-level scans over `products`.
pub struct InventoryRepo;

impl InventoryRepo {
    /// Active products at or below their reorder level but still in stock.
    pub async fn list_low_stock(pool: &PgPool) -> Result<Vec<ProductStock>, sqlx::Error> {
        sqlx::query_as::<_, ProductStock>(
            "SELECT id, name, sku, quantity_on_hand, reorder_level, branch_id \
             FROM products \
             WHERE is_active = true \
               AND quantity_on_hand > 0 \
               AND quantity_on_hand <= reorder_level \
             ORDER BY id ASC",
        )
        .fetch_all(pool)
        .await
    }
}
