//! Stock counter updates.

use async_trait::async_trait;
use tracing::instrument;

use nonito_core::ProductSlug;

use super::{PgStore, RepositoryError};
use crate::store::InventoryStore;

#[async_trait]
impl InventoryStore for PgStore {
    #[instrument(skip(self), fields(product = %slug))]
    async fn deduct_stock(
        &self,
        slug: &ProductSlug,
        quantity: u32,
    ) -> Result<u32, RepositoryError> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE products
            SET stock = GREATEST(stock - $2, 0), updated_at = NOW()
            WHERE slug = $1
            RETURNING stock
            ",
        )
        .bind(slug.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(self.pool())
        .await?;

        let remaining = remaining.ok_or(RepositoryError::NotFound)?;
        u32::try_from(remaining)
            .map_err(|e| RepositoryError::DataCorruption(format!("negative stock: {e}")))
    }
}
