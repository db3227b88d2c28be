//! Wishlist reconciliation engine.
//!
//! Mirrors the cart engine's dual-mode shape, specialized to
//! single-field entries (no quantity or size). One deliberate asymmetry
//! with the cart: wishlist writes require a signed-in session — a guest
//! `add`/`toggle` is rejected with [`StoreError::AuthRequired`] instead
//! of falling back to local storage, so the caller can prompt for
//! sign-in rather than silently proceed.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::instrument;

use sable_core::{ItemId, ProductId, ProductSummary, WishlistEntry};

use crate::api::WishlistApi;
use crate::error::StoreError;
use crate::session::SessionContext;
use crate::storage::{GuestStore, KeyValueStorage};

/// Dual-mode wishlist engine.
///
/// Cheaply cloneable; clones share the in-memory snapshot.
pub struct WishlistService<A, S> {
    inner: Arc<WishlistServiceInner<A, S>>,
}

impl<A, S> Clone for WishlistService<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct WishlistServiceInner<A, S> {
    api: A,
    guest: GuestStore<S>,
    session: SessionContext<S>,
    entries: RwLock<Vec<WishlistEntry>>,
}

impl<A: WishlistApi, S: KeyValueStorage> WishlistService<A, S> {
    /// Create an engine over the given API, storage area, and session.
    pub fn new(api: A, storage: S, session: SessionContext<S>) -> Self {
        Self {
            inner: Arc::new(WishlistServiceInner {
                api,
                guest: GuestStore::new(storage),
                session,
                entries: RwLock::new(Vec::new()),
            }),
        }
    }

    fn replace_state(&self, entries: Vec<WishlistEntry>) {
        *self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner) = entries;
    }

    fn mutate_state(&self, mutate: impl FnOnce(&mut Vec<WishlistEntry>)) {
        mutate(
            &mut self
                .inner
                .entries
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    /// Snapshot of the current in-memory wishlist.
    #[must_use]
    pub fn entries(&self) -> Vec<WishlistEntry> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of entries in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the product is present in the snapshot.
    #[must_use]
    pub fn is_in_wishlist(&self, product_id: ProductId) -> bool {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|e| e.product_id == product_id)
    }

    fn entry_id_for(&self, product_id: ProductId) -> Option<ItemId> {
        self.inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|e| e.product_id == product_id)
            .map(|e| e.id.clone())
    }

    /// Replace in-memory state from the authoritative store.
    ///
    /// Guest mode reads the stored array as a view of any legacy local
    /// data; writes still require authentication.
    ///
    /// # Errors
    ///
    /// On failure the prior in-memory state is left untouched.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Vec<WishlistEntry>, StoreError> {
        let entries = if self.inner.session.is_authenticated() {
            self.inner.api.fetch_wishlist().await?
        } else {
            self.inner.guest.read_wishlist()
        };
        self.replace_state(entries.clone());
        Ok(entries)
    }

    /// Add a product to the wishlist.
    ///
    /// # Errors
    ///
    /// Rejects unauthenticated callers with [`StoreError::AuthRequired`]
    /// before any I/O.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&self, product: &ProductSummary) -> Result<(), StoreError> {
        if !self.inner.session.is_authenticated() {
            return Err(StoreError::AuthRequired);
        }
        self.inner.api.add_wishlist_entry(product.id).await?;
        self.load().await?;
        Ok(())
    }

    /// Remove one entry by its id.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove_by_item_id(&self, item_id: &ItemId) -> Result<(), StoreError> {
        if self.inner.session.is_authenticated() {
            self.inner.api.delete_wishlist_entry(item_id).await?;
            self.mutate_state(|entries| entries.retain(|e| &e.id != item_id));
        } else {
            let mut entries = self.inner.guest.read_wishlist();
            entries.retain(|e| &e.id != item_id);
            self.inner.guest.write_wishlist(&entries)?;
            self.replace_state(entries);
        }
        Ok(())
    }

    /// Remove whatever entry references the product, if any.
    #[instrument(skip(self))]
    pub async fn remove_by_product_id(&self, product_id: ProductId) -> Result<(), StoreError> {
        if self.inner.session.is_authenticated() {
            self.inner.api.delete_wishlist_by_product(product_id).await?;
            self.mutate_state(|entries| entries.retain(|e| e.product_id != product_id));
        } else {
            let mut entries = self.inner.guest.read_wishlist();
            entries.retain(|e| e.product_id != product_id);
            self.inner.guest.write_wishlist(&entries)?;
            self.replace_state(entries);
        }
        Ok(())
    }

    /// Flip a product's wishlist membership.
    ///
    /// Present: resolve the entry id from local state and remove by id,
    /// falling back to remove-by-product-id when the id is not found
    /// locally (a stale read immediately after a refresh). Absent: add.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::add`] on the add path.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn toggle(&self, product: &ProductSummary) -> Result<(), StoreError> {
        if self.is_in_wishlist(product.id) {
            match self.entry_id_for(product.id) {
                Some(entry_id) => self.remove_by_item_id(&entry_id).await,
                None => self.remove_by_product_id(product.id).await,
            }
        } else {
            self.add(product).await
        }
    }
}
