//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog_cache::CatalogCache;
use crate::config::StorefrontConfig;
use crate::payment::PaymentGateway;
use crate::store::{CatalogStore, Store};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the store, the catalog cache and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn Store>,
    catalog_store: Arc<dyn CatalogStore>,
    catalog: CatalogCache,
    payment: Option<Arc<dyn PaymentGateway>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `store` - Catalog, inventory and ledger storage
    /// * `payment` - Payment gateway, `None` when no credentials are configured
    #[must_use]
    pub fn new<S>(
        config: StorefrontConfig,
        store: Arc<S>,
        payment: Option<Arc<dyn PaymentGateway>>,
    ) -> Self
    where
        S: Store + 'static,
    {
        let catalog_store: Arc<dyn CatalogStore> = store.clone();
        let catalog = CatalogCache::new(Arc::clone(&catalog_store));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                catalog_store,
                catalog,
                payment,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get the store (inventory and ledger).
    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Get the authoritative catalog store, bypassing the cache.
    #[must_use]
    pub fn catalog_store(&self) -> &dyn CatalogStore {
        self.inner.catalog_store.as_ref()
    }

    /// Get the catalog cache.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    /// Get the payment gateway, if configured.
    #[must_use]
    pub fn payment(&self) -> Option<&dyn PaymentGateway> {
        self.inner.payment.as_deref()
    }
}
