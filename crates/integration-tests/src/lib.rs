//! Integration test harness for the Sable storefront client.
//!
//! Wires the real engines against an in-process [`FakeBackend`] that
//! implements the API traits, records every call, and can hold or fail
//! individual operations so tests can exercise interleavings (concurrent
//! merge callers, merge failure and retry) deterministically.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rust_decimal::Decimal;
use tokio::sync::Semaphore;

use sable_core::{
    AvailabilitySet, CartLineItem, ItemId, Price, ProductId, SizeId, SizeOption, WishlistEntry,
};
use sable_storefront::api::{CartApi, CartItemPayload, WarehouseApi, WishlistApi};
use sable_storefront::availability::SizeResolver;
use sable_storefront::cart::CartService;
use sable_storefront::error::StoreError;
use sable_storefront::session::SessionContext;
use sable_storefront::storage::{KeyValueStorage, MemoryStorage, keys};
use sable_storefront::wishlist::WishlistService;

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared recording state behind a [`FakeBackend`].
pub struct BackendState {
    cart: Mutex<Vec<CartLineItem>>,
    wishlist: Mutex<Vec<WishlistEntry>>,
    sizes: Mutex<HashMap<ProductId, Vec<SizeOption>>>,
    next_id: AtomicUsize,
    /// Count of merge POSTs received.
    pub merge_posts: AtomicUsize,
    /// JSON bodies of merge POSTs, in arrival order.
    pub merge_bodies: Mutex<Vec<serde_json::Value>>,
    fail_merge: AtomicBool,
    hold_merge: AtomicBool,
    merge_gate: Semaphore,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            cart: Mutex::new(Vec::new()),
            wishlist: Mutex::new(Vec::new()),
            sizes: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            merge_posts: AtomicUsize::new(0),
            merge_bodies: Mutex::new(Vec::new()),
            fail_merge: AtomicBool::new(false),
            hold_merge: AtomicBool::new(false),
            merge_gate: Semaphore::new(0),
        }
    }
}

/// In-process stand-in for the backend REST API.
#[derive(Clone, Default)]
pub struct FakeBackend {
    /// Recording state, shared across clones.
    pub state: Arc<BackendState>,
}

impl FakeBackend {
    fn next_server_id(&self) -> i64 {
        self.state.next_id.fetch_add(1, Ordering::SeqCst) as i64
    }

    /// Current server-side cart contents.
    #[must_use]
    pub fn server_cart(&self) -> Vec<CartLineItem> {
        lock(&self.state.cart).clone()
    }

    /// Make the next merge POSTs fail with a 500.
    pub fn fail_merges(&self, fail: bool) {
        self.state.fail_merge.store(fail, Ordering::SeqCst);
    }

    /// Hold merge POSTs open until [`Self::release_merge`] is called.
    pub fn hold_merges(&self) {
        self.state.hold_merge.store(true, Ordering::SeqCst);
    }

    /// Release one held merge POST.
    pub fn release_merge(&self) {
        self.state.merge_gate.add_permits(1);
    }

    /// Seed the warehouse size list for a product.
    pub fn set_sizes(&self, product: ProductId, sizes: Vec<SizeOption>) {
        lock(&self.state.sizes).insert(product, sizes);
    }
}

impl CartApi for FakeBackend {
    async fn fetch_cart(&self) -> Result<Vec<CartLineItem>, StoreError> {
        Ok(self.server_cart())
    }

    async fn add_cart_item(&self, item: CartItemPayload) -> Result<(), StoreError> {
        let id = self.next_server_id();
        let mut cart = lock(&self.state.cart);
        if let Some(existing) = cart
            .iter_mut()
            .find(|i| i.matches_variant(item.product_id, item.size_id))
        {
            existing.quantity += item.quantity;
        } else {
            cart.push(server_line(id, item));
        }
        Ok(())
    }

    async fn delete_cart_item(&self, id: &ItemId) -> Result<(), StoreError> {
        lock(&self.state.cart).retain(|i| &i.id != id);
        Ok(())
    }

    async fn update_cart_item_quantity(
        &self,
        id: &ItemId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        if let Some(item) = lock(&self.state.cart).iter_mut().find(|i| &i.id == id) {
            item.quantity = quantity;
        }
        Ok(())
    }

    async fn update_cart_item_size(&self, id: &ItemId, size_id: SizeId) -> Result<(), StoreError> {
        if let Some(item) = lock(&self.state.cart).iter_mut().find(|i| &i.id == id) {
            item.size_id = size_id;
        }
        Ok(())
    }

    async fn merge_cart(&self, guest_cart: Vec<CartItemPayload>) -> Result<(), StoreError> {
        self.state.merge_posts.fetch_add(1, Ordering::SeqCst);
        if let Ok(body) = serde_json::to_value(&guest_cart) {
            lock(&self.state.merge_bodies).push(body);
        }

        if self.state.hold_merge.load(Ordering::SeqCst) {
            // Held open so a test can interleave a second caller.
            let permit = self.state.merge_gate.acquire().await.map_err(|_| {
                StoreError::Status {
                    status: 500,
                    body: "merge gate closed".to_string(),
                }
            })?;
            permit.forget();
        }

        if self.state.fail_merge.load(Ordering::SeqCst) {
            return Err(StoreError::Status {
                status: 500,
                body: "merge failed".to_string(),
            });
        }

        for line in guest_cart {
            let id = self.next_server_id();
            let mut cart = lock(&self.state.cart);
            if let Some(existing) = cart
                .iter_mut()
                .find(|i| i.matches_variant(line.product_id, line.size_id))
            {
                existing.quantity += line.quantity;
            } else {
                cart.push(server_line(id, line));
            }
        }
        Ok(())
    }
}

impl WishlistApi for FakeBackend {
    async fn fetch_wishlist(&self) -> Result<Vec<WishlistEntry>, StoreError> {
        Ok(lock(&self.state.wishlist).clone())
    }

    async fn add_wishlist_entry(&self, product_id: ProductId) -> Result<(), StoreError> {
        let id = self.next_server_id();
        let mut wishlist = lock(&self.state.wishlist);
        if wishlist.iter().all(|e| e.product_id != product_id) {
            wishlist.push(WishlistEntry {
                id: ItemId::Server(id),
                product_id,
                name: format!("Product {product_id}"),
                price: Price::new(Decimal::from(25)),
                image_url: None,
            });
        }
        Ok(())
    }

    async fn delete_wishlist_entry(&self, id: &ItemId) -> Result<(), StoreError> {
        lock(&self.state.wishlist).retain(|e| &e.id != id);
        Ok(())
    }

    async fn delete_wishlist_by_product(&self, product_id: ProductId) -> Result<(), StoreError> {
        lock(&self.state.wishlist).retain(|e| e.product_id != product_id);
        Ok(())
    }
}

impl WarehouseApi for FakeBackend {
    async fn fetch_product_sizes(
        &self,
        product_id: ProductId,
    ) -> Result<AvailabilitySet, StoreError> {
        let sizes = lock(&self.state.sizes)
            .get(&product_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
        Ok(AvailabilitySet::new(sizes))
    }
}

fn server_line(id: i64, item: CartItemPayload) -> CartLineItem {
    CartLineItem {
        id: ItemId::Server(id),
        product_id: item.product_id,
        size_id: item.size_id,
        quantity: item.quantity,
        price: Price::new(Decimal::from(10)),
        name: format!("Product {}", item.product_id),
        image_url: None,
    }
}

/// One storage area, one fake backend, and the engines over them.
pub struct TestContext {
    /// Shared client-local storage area.
    pub storage: MemoryStorage,
    /// Recording fake backend.
    pub backend: FakeBackend,
    /// Cart engine under test.
    pub cart: CartService<FakeBackend, MemoryStorage>,
    /// Wishlist engine under test.
    pub wishlist: WishlistService<FakeBackend, MemoryStorage>,
    /// Availability resolver under test.
    pub resolver: SizeResolver<FakeBackend>,
}

impl TestContext {
    /// Build a fresh signed-out context.
    #[must_use]
    pub fn new() -> Self {
        let storage = MemoryStorage::new();
        let backend = FakeBackend::default();
        let session = SessionContext::new(storage.clone());
        let cart = CartService::new(backend.clone(), storage.clone(), session.clone());
        let wishlist = WishlistService::new(backend.clone(), storage.clone(), session);
        let resolver = SizeResolver::new(backend.clone());
        Self {
            storage,
            backend,
            cart,
            wishlist,
            resolver,
        }
    }

    /// Persist a session token, switching engines to the remote store.
    pub fn sign_in(&self) {
        self.storage
            .set(keys::TOKEN, "jwt-test-token")
            .unwrap_or_else(|e| panic!("seed token: {e}"));
    }

    /// Drop the session token.
    pub fn sign_out(&self) {
        self.storage.remove(keys::TOKEN);
    }

    /// Parse the persisted guest cart array, empty if the key is gone.
    #[must_use]
    pub fn stored_guest_cart(&self) -> Vec<CartLineItem> {
        self.storage
            .get(keys::CART_ITEMS)
            .map(|raw| serde_json::from_str(&raw).unwrap_or_default())
            .unwrap_or_default()
    }

    /// Whether the guest cart key is still present in storage.
    #[must_use]
    pub fn guest_cart_key_present(&self) -> bool {
        self.storage.get(keys::CART_ITEMS).is_some()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
