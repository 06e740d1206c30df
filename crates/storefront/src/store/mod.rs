//! Storage seams for the catalog, the stock counters and the order ledger.
//!
//! Handlers and services depend on these traits rather than on a pool so the
//! HTTP surface can be exercised without a database. [`crate::db::PgStore`]
//! is the production implementation; [`MemoryStore`] backs tests and local
//! demos.

#[cfg(any(test, feature = "memory-store"))]
mod memory;

use async_trait::async_trait;

use nonito_core::{CheckoutSessionId, Fabric, FabricRole, Product, ProductSlug};

use crate::db::RepositoryError;

#[cfg(any(test, feature = "memory-store"))]
pub use memory::MemoryStore;

/// Read access to products and fabrics.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All active products, newest first.
    async fn active_products(&self) -> Result<Vec<Product>, RepositoryError>;

    /// A single product by slug, active or not.
    async fn product_by_slug(&self, slug: &ProductSlug)
    -> Result<Option<Product>, RepositoryError>;

    /// Active fabrics of one role, in display order.
    async fn active_fabrics(&self, role: FabricRole) -> Result<Vec<Fabric>, RepositoryError>;

    /// Cheap connectivity probe used by the readiness endpoint.
    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Write access to product stock.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Decrement a product's stock by `quantity`, clamped at zero.
    ///
    /// Returns the remaining stock. Fails with `RepositoryError::NotFound`
    /// when the product does not exist.
    async fn deduct_stock(
        &self,
        slug: &ProductSlug,
        quantity: u32,
    ) -> Result<u32, RepositoryError>;
}

/// The processed-order ledger.
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Atomically record `session` as processed.
    ///
    /// Returns `true` if this call inserted the record and `false` if it was
    /// already present. The insert itself is the idempotence gate.
    async fn claim(&self, session: &CheckoutSessionId) -> Result<bool, RepositoryError>;

    /// Whether `session` has been recorded.
    async fn is_processed(&self, session: &CheckoutSessionId) -> Result<bool, RepositoryError>;
}

/// Everything the storefront needs from storage.
pub trait Store: CatalogStore + InventoryStore + OrderLedger {}

impl<T> Store for T where T: CatalogStore + InventoryStore + OrderLedger {}
