//! Size/stock availability resolver.
//!
//! Fetches and caches the sellable size list per product via `moka`.
//! A cached set is treated as immutable for the cart session: the
//! resolver never invalidates entries on its own, and an explicit
//! [`SizeResolver::invalidate_all`] (page remount) is the only eviction
//! path, so server-side stock changes stay invisible until then.

use std::sync::Arc;

use moka::future::Cache;
use tracing::instrument;

use sable_core::{AvailabilitySet, CartLineItem, ItemId, ProductId, SizeId, SizeOption};

use crate::api::WarehouseApi;

const CACHE_CAPACITY: u64 = 1000;

/// The fixed provisional size list served before a product's real set
/// has been fetched. Callers must treat it as a rendering placeholder,
/// never as availability truth; [`SizeResolver::is_loaded`] tells the
/// two apart.
#[must_use]
pub fn default_sizes() -> AvailabilitySet {
    let names = ["XS", "S", "M", "L", "XL", "XXL"];
    AvailabilitySet::new(
        names
            .iter()
            .enumerate()
            .map(|(n, name)| SizeOption {
                size_id: SizeId::new(n as i32 + 1),
                name: (*name).to_string(),
                in_stock: true,
            })
            .collect(),
    )
}

/// Per-product availability cache over the public warehouse route.
///
/// Cheaply cloneable; all clones share one cache.
pub struct SizeResolver<A> {
    inner: Arc<SizeResolverInner<A>>,
}

impl<A> Clone for SizeResolver<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SizeResolverInner<A> {
    api: A,
    cache: Cache<ProductId, AvailabilitySet>,
}

impl<A: WarehouseApi> SizeResolver<A> {
    /// Create a resolver over the given warehouse API.
    pub fn new(api: A) -> Self {
        // No TTL: eviction only happens through invalidate_all.
        let cache = Cache::builder().max_capacity(CACHE_CAPACITY).build();
        Self {
            inner: Arc::new(SizeResolverInner { api, cache }),
        }
    }

    /// Fetch size sets for every product not already cached.
    ///
    /// An individual fetch failure is logged and leaves that product
    /// uncached (callers then see the fallback); the batch itself never
    /// fails.
    #[instrument(skip(self, product_ids))]
    pub async fn prime(&self, product_ids: &[ProductId]) {
        for &product_id in product_ids {
            if self.inner.cache.contains_key(&product_id) {
                continue;
            }
            match self.inner.api.fetch_product_sizes(product_id).await {
                Ok(set) => {
                    self.inner.cache.insert(product_id, set).await;
                }
                Err(e) => {
                    tracing::warn!(
                        product_id = %product_id,
                        error = %e,
                        "failed to fetch size availability"
                    );
                }
            }
        }
    }

    /// The product's cached size set, or the provisional fallback when
    /// nothing has been fetched yet.
    pub async fn available_sizes(&self, product_id: ProductId) -> AvailabilitySet {
        self.inner
            .cache
            .get(&product_id)
            .await
            .unwrap_or_else(default_sizes)
    }

    /// Whether a real (non-fallback) set is cached for the product.
    #[must_use]
    pub fn is_loaded(&self, product_id: ProductId) -> bool {
        self.inner.cache.contains_key(&product_id)
    }

    /// Evict every cached set (explicit reload).
    pub async fn invalidate_all(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks().await;
    }

    /// Ids of cart lines whose size is not currently in stock.
    ///
    /// A line only warns once its product's set has actually loaded; an
    /// unloaded set suppresses the warning so the async fetch gap cannot
    /// produce false positives.
    pub async fn stock_conflicts(&self, items: &[CartLineItem]) -> Vec<ItemId> {
        let mut conflicts = Vec::new();
        for item in items {
            let Some(set) = self.inner.cache.get(&item.product_id).await else {
                continue;
            };
            if !set.in_stock(item.size_id) {
                conflicts.push(item.id.clone());
            }
        }
        conflicts
    }
}
