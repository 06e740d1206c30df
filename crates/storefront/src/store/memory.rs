//! In-memory store for tests and local demos.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use nonito_core::{CheckoutSessionId, Fabric, FabricRole, Product, ProductSlug};

use super::{CatalogStore, InventoryStore, OrderLedger};
use crate::db::RepositoryError;

#[derive(Default)]
struct Inner {
    products: Vec<Product>,
    fabrics: Vec<Fabric>,
    processed: HashSet<CheckoutSessionId>,
}

/// Mutex-guarded catalog, stock and ledger.
///
/// Catalog reads can be made to fail with [`MemoryStore::set_unavailable`],
/// and the number of catalog reads is counted so cache behavior is observable.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    unavailable: AtomicBool,
    catalog_reads: AtomicUsize,
}

impl MemoryStore {
    /// Create a store holding the given catalog.
    #[must_use]
    pub fn new(products: Vec<Product>, fabrics: Vec<Fabric>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                products,
                fabrics,
                processed: HashSet::new(),
            }),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make catalog reads fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `active_products` calls served so far.
    #[must_use]
    pub fn catalog_reads(&self) -> usize {
        self.catalog_reads.load(Ordering::SeqCst)
    }

    /// Current stock of a product.
    #[must_use]
    pub fn stock(&self, slug: &ProductSlug) -> Option<u32> {
        self.lock()
            .products
            .iter()
            .find(|p| &p.slug == slug)
            .map(|p| p.stock)
    }

    /// Insert or replace a product.
    pub fn upsert_product(&self, product: Product) {
        let mut inner = self.lock();
        match inner.products.iter_mut().find(|p| p.slug == product.slug) {
            Some(existing) => *existing = product,
            None => inner.products.push(product),
        }
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn active_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.catalog_reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self
            .lock()
            .products
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn product_by_slug(
        &self,
        slug: &ProductSlug,
    ) -> Result<Option<Product>, RepositoryError> {
        self.check_available()?;
        Ok(self.lock().products.iter().find(|p| &p.slug == slug).cloned())
    }

    async fn active_fabrics(&self, role: FabricRole) -> Result<Vec<Fabric>, RepositoryError> {
        self.check_available()?;
        Ok(self
            .lock()
            .fabrics
            .iter()
            .filter(|f| f.is_active && f.role == role)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn deduct_stock(
        &self,
        slug: &ProductSlug,
        quantity: u32,
    ) -> Result<u32, RepositoryError> {
        let mut inner = self.lock();
        let product = inner
            .products
            .iter_mut()
            .find(|p| &p.slug == slug)
            .ok_or(RepositoryError::NotFound)?;
        product.stock = product.stock.saturating_sub(quantity);
        Ok(product.stock)
    }
}

#[async_trait]
impl OrderLedger for MemoryStore {
    async fn claim(&self, session: &CheckoutSessionId) -> Result<bool, RepositoryError> {
        Ok(self.lock().processed.insert(session.clone()))
    }

    async fn is_processed(&self, session: &CheckoutSessionId) -> Result<bool, RepositoryError> {
        Ok(self.lock().processed.contains(session))
    }
}

