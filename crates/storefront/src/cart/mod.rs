//! Cart reconciliation engine.
//!
//! Presents one cart API that transparently operates against either
//! guest storage or the remote cart resource, depending on the session's
//! authentication state at the moment of each call. The backend is
//! selected exactly once per operation; the rest of the operation is
//! backend-specific.
//!
//! The merge-on-login drain is the only non-reentrant operation: running
//! it twice concurrently could double-submit guest items, so it is
//! guarded by [`SingleFlight`].

mod single_flight;

pub use single_flight::{Flight, SingleFlight};

use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;
use tracing::instrument;

use sable_core::{CartLineItem, ItemDisplay, ItemId, ProductId, SizeId};

use crate::api::{CartApi, CartItemPayload};
use crate::error::StoreError;
use crate::session::SessionContext;
use crate::storage::{GuestStore, KeyValueStorage};

/// Which physical store is authoritative for the current call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Guest,
    Remote,
}

/// Dual-mode cart engine.
///
/// Cheaply cloneable; clones share the in-memory snapshot and the merge
/// guard, so concurrent mount points see one cart.
pub struct CartService<A, S> {
    inner: Arc<CartServiceInner<A, S>>,
}

impl<A, S> Clone for CartService<A, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CartServiceInner<A, S> {
    api: A,
    guest: GuestStore<S>,
    session: SessionContext<S>,
    items: RwLock<Vec<CartLineItem>>,
    merge_flight: SingleFlight,
}

impl<A: CartApi, S: KeyValueStorage> CartService<A, S> {
    /// Create an engine over the given API, guest storage area, and
    /// session context.
    pub fn new(api: A, storage: S, session: SessionContext<S>) -> Self {
        Self {
            inner: Arc::new(CartServiceInner {
                api,
                guest: GuestStore::new(storage),
                session,
                items: RwLock::new(Vec::new()),
                merge_flight: SingleFlight::new(),
            }),
        }
    }

    /// Re-derive the authoritative backend; never cached across calls.
    fn backend(&self) -> Backend {
        if self.inner.session.is_authenticated() {
            Backend::Remote
        } else {
            Backend::Guest
        }
    }

    fn replace_state(&self, items: Vec<CartLineItem>) {
        *self
            .inner
            .items
            .write()
            .unwrap_or_else(PoisonError::into_inner) = items;
    }

    fn mutate_state(&self, mutate: impl FnOnce(&mut Vec<CartLineItem>)) {
        mutate(
            &mut self
                .inner
                .items
                .write()
                .unwrap_or_else(PoisonError::into_inner),
        );
    }

    /// Snapshot of the current in-memory cart.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.inner
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sum of price x quantity over all lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items().iter().map(CartLineItem::line_total).sum()
    }

    /// Total formatted to two decimal places (e.g., "$64.00").
    #[must_use]
    pub fn display_total(&self) -> String {
        format!("${:.2}", self.total().round_dp(2))
    }

    /// Total unit count across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items().iter().map(|i| i.quantity).sum()
    }

    /// Replace in-memory state from the authoritative store.
    ///
    /// Authenticated: fetch the user's cart; last fetch wins wholesale.
    /// Guest: read the stored array.
    ///
    /// # Errors
    ///
    /// On failure the prior in-memory state is left untouched.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<Vec<CartLineItem>, StoreError> {
        let items = match self.backend() {
            Backend::Remote => self.inner.api.fetch_cart().await?,
            Backend::Guest => self.inner.guest.read_cart(),
        };
        self.replace_state(items.clone());
        Ok(items)
    }

    /// Add `quantity` units of a variant to the cart.
    ///
    /// Authenticated: POST, then reload so quantity-merge semantics stay
    /// server-decided. Guest: merge into an existing `(product, size)`
    /// line or append a new one carrying the display fields, then persist
    /// the whole array.
    ///
    /// # Errors
    ///
    /// Rejects `quantity == 0` with [`StoreError::InvalidQuantity`]
    /// before any I/O.
    #[instrument(skip(self, display))]
    pub async fn add(
        &self,
        product_id: ProductId,
        size_id: SizeId,
        quantity: u32,
        display: ItemDisplay,
    ) -> Result<(), StoreError> {
        if quantity < 1 {
            return Err(StoreError::InvalidQuantity(quantity));
        }

        match self.backend() {
            Backend::Remote => {
                self.inner
                    .api
                    .add_cart_item(CartItemPayload {
                        product_id,
                        size_id,
                        quantity,
                    })
                    .await?;
                self.load().await?;
            }
            Backend::Guest => {
                let mut items = self.inner.guest.read_cart();
                if let Some(existing) = items
                    .iter_mut()
                    .find(|i| i.matches_variant(product_id, size_id))
                {
                    existing.quantity = existing.quantity.saturating_add(quantity);
                } else {
                    items.push(CartLineItem {
                        id: ItemId::random(),
                        product_id,
                        size_id,
                        quantity,
                        price: display.price,
                        name: display.name,
                        image_url: display.image_url,
                    });
                }
                self.inner.guest.write_cart(&items)?;
                self.replace_state(items);
            }
        }
        Ok(())
    }

    /// Remove one line by id.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn remove(&self, item_id: &ItemId) -> Result<(), StoreError> {
        match self.backend() {
            Backend::Remote => {
                self.inner.api.delete_cart_item(item_id).await?;
                self.mutate_state(|items| items.retain(|i| &i.id != item_id));
            }
            Backend::Guest => {
                let mut items = self.inner.guest.read_cart();
                items.retain(|i| &i.id != item_id);
                self.inner.guest.write_cart(&items)?;
                self.replace_state(items);
            }
        }
        Ok(())
    }

    /// Replace one line's quantity.
    ///
    /// # Errors
    ///
    /// Rejects `quantity < 1` with [`StoreError::InvalidQuantity`]
    /// before any I/O; the line is unchanged. A guest-mode id that no
    /// longer exists is [`StoreError::NotFound`].
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_quantity(&self, item_id: &ItemId, quantity: u32) -> Result<(), StoreError> {
        if quantity < 1 {
            return Err(StoreError::InvalidQuantity(quantity));
        }

        match self.backend() {
            Backend::Remote => {
                self.inner
                    .api
                    .update_cart_item_quantity(item_id, quantity)
                    .await?;
                self.mutate_state(|items| {
                    if let Some(item) = items.iter_mut().find(|i| &i.id == item_id) {
                        item.quantity = quantity;
                    }
                });
            }
            Backend::Guest => {
                let mut items = self.inner.guest.read_cart();
                let Some(item) = items.iter_mut().find(|i| &i.id == item_id) else {
                    return Err(StoreError::NotFound(format!("cart item {item_id}")));
                };
                item.quantity = quantity;
                self.inner.guest.write_cart(&items)?;
                self.replace_state(items);
            }
        }
        Ok(())
    }

    /// Replace one line's size variant.
    ///
    /// Performs no availability validation; callers consult the size
    /// resolver before offering a size for selection.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn update_size(&self, item_id: &ItemId, size_id: SizeId) -> Result<(), StoreError> {
        match self.backend() {
            Backend::Remote => {
                self.inner
                    .api
                    .update_cart_item_size(item_id, size_id)
                    .await?;
                self.mutate_state(|items| {
                    if let Some(item) = items.iter_mut().find(|i| &i.id == item_id) {
                        item.size_id = size_id;
                    }
                });
            }
            Backend::Guest => {
                let mut items = self.inner.guest.read_cart();
                let Some(item) = items.iter_mut().find(|i| &i.id == item_id) else {
                    return Err(StoreError::NotFound(format!("cart item {item_id}")));
                };
                item.size_id = size_id;
                self.inner.guest.write_cart(&items)?;
                self.replace_state(items);
            }
        }
        Ok(())
    }

    /// Drain the guest cart into the signed-in user's server cart.
    ///
    /// Single-flight: a second concurrent caller collapses into a no-op
    /// while the first run is in flight. No-ops when signed out or when
    /// the guest array is empty. On success guest storage is cleared
    /// unconditionally and the merged cart is reloaded; on failure guest
    /// storage is left intact so the merge can be retried.
    #[instrument(skip(self))]
    pub async fn merge_on_login(&self) -> Result<(), StoreError> {
        // RAII token: released on every exit path.
        let Some(_flight) = self.inner.merge_flight.try_begin() else {
            tracing::debug!("cart merge already in flight, collapsing caller");
            return Ok(());
        };

        if !self.inner.session.is_authenticated() {
            return Ok(());
        }

        let guest_items = self.inner.guest.read_cart();
        if guest_items.is_empty() {
            return Ok(());
        }

        let payload = guest_items.iter().map(CartItemPayload::from).collect();
        self.inner.api.merge_cart(payload).await?;

        self.inner.guest.clear_cart();
        self.load().await?;
        Ok(())
    }

    /// Reset the in-memory view only (used on logout).
    ///
    /// Persisted guest storage is deliberately untouched: dropping the
    /// client-side view must not destroy a cart that lives server-side.
    pub fn clear(&self) {
        self.replace_state(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use rust_decimal::Decimal;
    use sable_core::Price;

    use crate::storage::{MemoryStorage, keys};

    #[derive(Default)]
    struct FakeState {
        cart: std::sync::Mutex<Vec<CartLineItem>>,
        fetch_calls: AtomicUsize,
        add_calls: AtomicUsize,
        merge_calls: AtomicUsize,
        fail_fetch: AtomicBool,
        fail_merge: AtomicBool,
    }

    #[derive(Clone, Default)]
    struct FakeCartApi {
        state: Arc<FakeState>,
    }

    impl FakeCartApi {
        fn respond_with(&self, items: Vec<CartLineItem>) {
            *self.state.cart.lock().unwrap() = items;
        }

        fn network_calls(&self) -> usize {
            self.state.fetch_calls.load(Ordering::SeqCst)
                + self.state.add_calls.load(Ordering::SeqCst)
                + self.state.merge_calls.load(Ordering::SeqCst)
        }
    }

    impl CartApi for FakeCartApi {
        async fn fetch_cart(&self) -> Result<Vec<CartLineItem>, StoreError> {
            self.state.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.state.fail_fetch.load(Ordering::SeqCst) {
                return Err(StoreError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                });
            }
            Ok(self.state.cart.lock().unwrap().clone())
        }

        async fn add_cart_item(&self, item: CartItemPayload) -> Result<(), StoreError> {
            self.state.add_calls.fetch_add(1, Ordering::SeqCst);
            let mut cart = self.state.cart.lock().unwrap();
            let next_id = cart.len() as i64 + 1;
            cart.push(CartLineItem {
                id: ItemId::Server(next_id),
                product_id: item.product_id,
                size_id: item.size_id,
                quantity: item.quantity,
                price: Price::new(Decimal::from(10)),
                name: "Server Item".to_string(),
                image_url: None,
            });
            Ok(())
        }

        async fn delete_cart_item(&self, id: &ItemId) -> Result<(), StoreError> {
            self.state.cart.lock().unwrap().retain(|i| &i.id != id);
            Ok(())
        }

        async fn update_cart_item_quantity(
            &self,
            id: &ItemId,
            quantity: u32,
        ) -> Result<(), StoreError> {
            let mut cart = self.state.cart.lock().unwrap();
            if let Some(item) = cart.iter_mut().find(|i| &i.id == id) {
                item.quantity = quantity;
            }
            Ok(())
        }

        async fn update_cart_item_size(
            &self,
            id: &ItemId,
            size_id: SizeId,
        ) -> Result<(), StoreError> {
            let mut cart = self.state.cart.lock().unwrap();
            if let Some(item) = cart.iter_mut().find(|i| &i.id == id) {
                item.size_id = size_id;
            }
            Ok(())
        }

        async fn merge_cart(&self, guest_cart: Vec<CartItemPayload>) -> Result<(), StoreError> {
            self.state.merge_calls.fetch_add(1, Ordering::SeqCst);
            if self.state.fail_merge.load(Ordering::SeqCst) {
                return Err(StoreError::Status {
                    status: 500,
                    body: "merge failed".to_string(),
                });
            }
            let mut cart = self.state.cart.lock().unwrap();
            for (n, line) in guest_cart.into_iter().enumerate() {
                cart.push(CartLineItem {
                    id: ItemId::Server(100 + n as i64),
                    product_id: line.product_id,
                    size_id: line.size_id,
                    quantity: line.quantity,
                    price: Price::new(Decimal::from(10)),
                    name: "Merged Item".to_string(),
                    image_url: None,
                });
            }
            Ok(())
        }
    }

    fn display() -> ItemDisplay {
        ItemDisplay {
            name: "Linen Shirt".to_string(),
            price: Price::new("32.00".parse::<Decimal>().unwrap()),
            image_url: None,
        }
    }

    fn guest_service() -> (CartService<FakeCartApi, MemoryStorage>, FakeCartApi, MemoryStorage) {
        let storage = MemoryStorage::new();
        let api = FakeCartApi::default();
        let service = CartService::new(
            api.clone(),
            storage.clone(),
            SessionContext::new(storage.clone()),
        );
        (service, api, storage)
    }

    fn sign_in(storage: &MemoryStorage) {
        storage.set(keys::TOKEN, "jwt-abc").unwrap();
    }

    #[tokio::test]
    async fn guest_duplicate_add_merges_quantity() {
        let (service, _, _) = guest_service();
        service
            .add(ProductId::new(7), SizeId::new(2), 1, display())
            .await
            .unwrap();
        service
            .add(ProductId::new(7), SizeId::new(2), 1, display())
            .await
            .unwrap();

        let items = service.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.first().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn guest_add_never_issues_a_network_call() {
        let (service, api, _) = guest_service();
        service
            .add(ProductId::new(7), SizeId::new(2), 1, display())
            .await
            .unwrap();
        service.load().await.unwrap();
        assert_eq!(api.network_calls(), 0);
    }

    #[tokio::test]
    async fn authenticated_add_never_writes_guest_storage() {
        let (service, api, storage) = guest_service();
        sign_in(&storage);

        service
            .add(ProductId::new(7), SizeId::new(2), 1, display())
            .await
            .unwrap();

        assert!(storage.get(keys::CART_ITEMS).is_none());
        assert_eq!(api.state.add_calls.load(Ordering::SeqCst), 1);
        // add reloads to pick up the canonical server result
        assert_eq!(api.state.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.items().len(), 1);
    }

    #[tokio::test]
    async fn quantity_floor_is_rejected_without_mutation() {
        let (service, _, _) = guest_service();
        service
            .add(ProductId::new(7), SizeId::new(2), 3, display())
            .await
            .unwrap();
        let id = service.items().first().unwrap().id.clone();

        let err = service.update_quantity(&id, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidQuantity(0)));
        assert_eq!(service.items().first().unwrap().quantity, 3);

        let err = service.add(ProductId::new(7), SizeId::new(2), 0, display()).await;
        assert!(matches!(err, Err(StoreError::InvalidQuantity(0))));
        assert_eq!(service.items().first().unwrap().quantity, 3);
    }

    #[tokio::test]
    async fn load_failure_leaves_prior_state_untouched() {
        let (service, api, storage) = guest_service();
        service
            .add(ProductId::new(1), SizeId::new(1), 2, display())
            .await
            .unwrap();

        sign_in(&storage);
        api.state.fail_fetch.store(true, Ordering::SeqCst);

        let err = service.load().await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 502, .. }));
        assert_eq!(service.items().len(), 1);
    }

    #[tokio::test]
    async fn merge_failure_preserves_guest_storage() {
        let (service, api, storage) = guest_service();
        for product in [1, 2, 3] {
            service
                .add(ProductId::new(product), SizeId::new(1), 1, display())
                .await
                .unwrap();
        }

        sign_in(&storage);
        api.state.fail_merge.store(true, Ordering::SeqCst);

        let err = service.merge_on_login().await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 500, .. }));

        let stored: Vec<CartLineItem> =
            serde_json::from_str(&storage.get(keys::CART_ITEMS).unwrap()).unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(api.state.merge_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn merge_noops_when_signed_out_or_empty() {
        let (service, api, storage) = guest_service();

        // Signed out: nothing happens even with guest items present.
        service
            .add(ProductId::new(1), SizeId::new(1), 1, display())
            .await
            .unwrap();
        service.merge_on_login().await.unwrap();
        assert_eq!(api.state.merge_calls.load(Ordering::SeqCst), 0);

        // Signed in with an empty guest cart: still nothing.
        storage.remove(keys::CART_ITEMS);
        sign_in(&storage);
        service.merge_on_login().await.unwrap();
        assert_eq!(api.state.merge_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn clear_resets_memory_but_not_storage() {
        let (service, _, storage) = guest_service();
        service
            .add(ProductId::new(1), SizeId::new(1), 1, display())
            .await
            .unwrap();

        service.clear();
        assert!(service.items().is_empty());
        assert!(storage.get(keys::CART_ITEMS).is_some());
    }

    #[tokio::test]
    async fn guest_remove_and_update_size_persist() {
        let (service, _, storage) = guest_service();
        service
            .add(ProductId::new(1), SizeId::new(1), 1, display())
            .await
            .unwrap();
        service
            .add(ProductId::new(2), SizeId::new(1), 1, display())
            .await
            .unwrap();

        let first_id = service.items().first().unwrap().id.clone();
        service.update_size(&first_id, SizeId::new(4)).await.unwrap();
        assert_eq!(service.items().first().unwrap().size_id, SizeId::new(4));

        service.remove(&first_id).await.unwrap();
        let stored: Vec<CartLineItem> =
            serde_json::from_str(&storage.get(keys::CART_ITEMS).unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.first().unwrap().product_id, ProductId::new(2));
    }

    #[tokio::test]
    async fn total_sums_price_times_quantity() {
        let (service, _, _) = guest_service();
        service
            .add(ProductId::new(1), SizeId::new(1), 2, display())
            .await
            .unwrap();
        assert_eq!(service.total(), "64.00".parse::<Decimal>().unwrap());
        assert_eq!(service.display_total(), "$64.00");
        assert_eq!(service.item_count(), 2);
    }
}
