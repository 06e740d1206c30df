//! Stale-while-revalidate catalog cache.
//!
//! Holds one immutable [`Catalog`] snapshot in a `moka` cache. Readers always
//! get a whole snapshot; a refresh replaces it in a single insert. The
//! freshness policy lives in [`CatalogCache::get`], which reports whether the
//! snapshot is older than the TTL, and [`CatalogCache::load`], which decides
//! between serving the snapshot and fetching.
//!
//! - fresh snapshot: served immediately, a background refresh is started
//! - stale snapshot: blocking fetch; if that fails the stale snapshot is served
//! - no snapshot: blocking fetch; if that fails an empty catalog is served

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use moka::future::Cache;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use nonito_core::{Catalog, CatalogFabrics, FabricRole};

use crate::db::RepositoryError;
use crate::store::CatalogStore;

/// How long a snapshot counts as fresh.
pub const CATALOG_TTL: Duration = Duration::from_secs(5 * 60);

const SNAPSHOT_KEY: &str = "catalog";

/// A catalog plus the moment it was fetched.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub catalog: Arc<Catalog>,
    pub fetched_at: Instant,
}

impl CatalogSnapshot {
    fn new(catalog: Catalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
            fetched_at: Instant::now(),
        }
    }

    /// Whether the snapshot has outlived `ttl`.
    #[must_use]
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() >= ttl
    }
}

/// Cached view of the catalog store.
#[derive(Clone)]
pub struct CatalogCache {
    inner: Arc<CatalogCacheInner>,
}

struct CatalogCacheInner {
    store: Arc<dyn CatalogStore>,
    cache: Cache<&'static str, CatalogSnapshot>,
    ttl: Duration,
    refreshing: AtomicBool,
}

/// Clears the single-flight flag when the refresh task ends, however it ends.
struct RefreshGuard(Arc<CatalogCacheInner>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.refreshing.store(false, Ordering::Release);
    }
}

impl CatalogCache {
    /// Create a cache in front of `store` with the default TTL.
    #[must_use]
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self::with_ttl(store, CATALOG_TTL)
    }

    /// Create a cache with a custom TTL.
    #[must_use]
    pub fn with_ttl(store: Arc<dyn CatalogStore>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CatalogCacheInner {
                store,
                cache: Cache::builder().max_capacity(1).build(),
                ttl,
                refreshing: AtomicBool::new(false),
            }),
        }
    }

    /// The current snapshot and whether it is stale, without fetching.
    pub async fn get(&self) -> Option<(CatalogSnapshot, bool)> {
        let snapshot = self.inner.cache.get(SNAPSHOT_KEY).await?;
        let stale = snapshot.is_stale(self.inner.ttl);
        Some((snapshot, stale))
    }

    /// Get the catalog, fetching only when there is no fresh snapshot.
    ///
    /// Never fails: a failed fetch falls back to the stale snapshot, or to an
    /// empty catalog when nothing has been fetched yet.
    pub async fn load(&self) -> Arc<Catalog> {
        match self.try_load().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Catalog unavailable, serving empty catalog");
                Arc::new(Catalog::default())
            }
        }
    }

    /// Like [`load`](Self::load), but reports a failed fetch when there is no
    /// snapshot to fall back to.
    ///
    /// # Errors
    ///
    /// Returns the store error if no snapshot exists and the fetch fails.
    #[instrument(skip(self))]
    pub async fn try_load(&self) -> Result<Arc<Catalog>, RepositoryError> {
        match self.get().await {
            Some((snapshot, false)) => {
                debug!("Catalog cache hit");
                self.spawn_refresh();
                Ok(snapshot.catalog)
            }
            Some((snapshot, true)) => match self.refresh().await {
                Ok(fresh) => Ok(fresh),
                Err(e) => {
                    warn!(error = %e, "Catalog refresh failed, serving stale snapshot");
                    Ok(snapshot.catalog)
                }
            },
            None => {
                let store = Arc::clone(&self.inner.store);
                let snapshot = self
                    .inner
                    .cache
                    .try_get_with(SNAPSHOT_KEY, async move {
                        fetch(store.as_ref()).await.map(CatalogSnapshot::new)
                    })
                    .await
                    .map_err(unwrap_shared)?;
                Ok(snapshot.catalog)
            }
        }
    }

    /// Fetch from the store and replace the snapshot.
    ///
    /// # Errors
    ///
    /// Returns the store error; the previous snapshot is left in place.
    pub async fn refresh(&self) -> Result<Arc<Catalog>, RepositoryError> {
        refresh_inner(&self.inner).await
    }

    /// Start a background refresh unless one is already running.
    ///
    /// Returns the task handle when a refresh was started.
    pub fn spawn_refresh(&self) -> Option<JoinHandle<()>> {
        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let guard = RefreshGuard(Arc::clone(&self.inner));
        Some(tokio::spawn(async move {
            if let Err(e) = refresh_inner(&guard.0).await {
                warn!(error = %e, "Background catalog refresh failed");
            }
        }))
    }

    /// Drop the snapshot.
    pub async fn invalidate(&self) {
        self.inner.cache.invalidate(SNAPSHOT_KEY).await;
    }
}

async fn refresh_inner(inner: &CatalogCacheInner) -> Result<Arc<Catalog>, RepositoryError> {
    let snapshot = CatalogSnapshot::new(fetch(inner.store.as_ref()).await?);
    let catalog = Arc::clone(&snapshot.catalog);
    inner.cache.insert(SNAPSHOT_KEY, snapshot).await;
    debug!(products = catalog.products.len(), "Catalog snapshot replaced");
    Ok(catalog)
}

async fn fetch(store: &dyn CatalogStore) -> Result<Catalog, RepositoryError> {
    let (products, outer, inner) = tokio::try_join!(
        store.active_products(),
        store.active_fabrics(FabricRole::Outer),
        store.active_fabrics(FabricRole::Inner),
    )?;
    Ok(Catalog::new(products, CatalogFabrics { outer, inner }))
}

/// `try_get_with` shares the error between coalesced callers.
fn unwrap_shared(err: Arc<RepositoryError>) -> RepositoryError {
    Arc::try_unwrap(err).unwrap_or_else(|shared| match shared.as_ref() {
        RepositoryError::NotFound => RepositoryError::NotFound,
        other => RepositoryError::DataCorruption(other.to_string()),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{fabric, product};

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(
            vec![product("necessar", 350, 10)],
            vec![fabric("linne", FabricRole::Outer), fabric("bomull", FabricRole::Inner)],
        ))
    }

    #[tokio::test]
    async fn test_first_load_fetches() {
        let store = store();
        let cache = CatalogCache::new(store.clone());
        assert!(cache.get().await.is_none());

        let catalog = cache.load().await;
        assert_eq!(catalog.products.len(), 1);
        assert_eq!(catalog.fabrics.outer.len(), 1);
        assert_eq!(catalog.fabrics.inner.len(), 1);
        assert_eq!(store.catalog_reads(), 1);

        let (_, stale) = cache.get().await.unwrap();
        assert!(!stale);
    }

    #[tokio::test]
    async fn test_fresh_hit_serves_snapshot_and_refreshes_in_background() {
        let store = store();
        let cache = CatalogCache::new(store.clone());
        cache.load().await;

        let mut updated = product("necessar", 400, 10);
        updated.name = "Necessär".to_string();
        store.upsert_product(updated);

        // Served from the snapshot while the refresh runs.
        let catalog = cache.load().await;
        assert_eq!(catalog.products[0].price.amount(), 350);

        // Wait for the refresh started above, then the snapshot is new.
        while cache.inner.refreshing.load(Ordering::Acquire) {
            tokio::task::yield_now().await;
        }
        let (snapshot, _) = cache.get().await.unwrap();
        assert_eq!(snapshot.catalog.products[0].price.amount(), 400);
    }

    #[tokio::test]
    async fn test_single_flight_refresh() {
        let cache = CatalogCache::new(store());
        cache.load().await;
        while cache.inner.refreshing.load(Ordering::Acquire) {
            tokio::task::yield_now().await;
        }

        cache.inner.refreshing.store(true, Ordering::Release);
        assert!(cache.spawn_refresh().is_none());
        cache.inner.refreshing.store(false, Ordering::Release);

        let handle = cache.spawn_refresh().unwrap();
        handle.await.unwrap();
        assert!(!cache.inner.refreshing.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_stale_snapshot_survives_failed_fetch() {
        let store = store();
        let cache = CatalogCache::with_ttl(store.clone(), Duration::ZERO);
        cache.load().await;

        let (_, stale) = cache.get().await.unwrap();
        assert!(stale);

        store.set_unavailable(true);
        let catalog = cache.try_load().await.unwrap();
        assert_eq!(catalog.products.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_refetched() {
        let store = store();
        let cache = CatalogCache::with_ttl(store.clone(), Duration::ZERO);
        cache.load().await;

        store.upsert_product(product("mini-pouch", 150, 5));
        let catalog = cache.load().await;
        assert_eq!(catalog.products.len(), 2);
    }

    #[tokio::test]
    async fn test_no_snapshot_and_failed_fetch() {
        let store = store();
        store.set_unavailable(true);
        let cache = CatalogCache::new(store.clone());

        assert!(cache.try_load().await.is_err());
        assert!(cache.load().await.is_empty());
        assert!(cache.get().await.is_none());

        store.set_unavailable(false);
        assert!(!cache.load().await.is_empty());
    }
}
