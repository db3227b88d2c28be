//! Client-local key-value storage and the guest store built on it.
//!
//! [`KeyValueStorage`] is the browser-storage seam: an embedding host (a
//! WASM shell over `localStorage`, an SSR server over its session layer)
//! supplies the implementation, and the engines only see string keys and
//! values. [`MemoryStorage`] ships for tests and same-process embedders.
//!
//! Guest cart and wishlist arrays are serialized as whole JSON documents
//! on every read/write; there is no incremental diffing.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

use sable_core::{CartLineItem, WishlistEntry};

use crate::error::StoreError;

/// Storage keys shared with the embedding UI host.
pub mod keys {
    /// Key for the guest cart line-item array.
    pub const CART_ITEMS: &str = "cartItems";

    /// Key for the guest wishlist entry array.
    pub const WISHLIST_ITEMS: &str = "wishlistItems";

    /// Key for the opaque session credential.
    pub const TOKEN: &str = "token";
}

/// A synchronous string key-value store.
///
/// Models browser storage: reads and writes are treated as instant, and
/// cross-tab write races are accepted (a guest cart has low durability
/// value). `set` may fail on quota exhaustion.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store rejects the write
    /// (e.g., quota exhaustion).
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove any value stored under `key`.
    fn remove(&self, key: &str);
}

/// In-memory [`KeyValueStorage`] backed by a shared hash map.
///
/// Cloning yields another handle onto the same map, matching how every
/// same-profile browser tab sees one storage area.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty storage area.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Guest-mode persistence for cart lines and wishlist entries.
///
/// Corrupt stored payloads are logged and read as empty rather than
/// failing the operation; a guest cart is not worth breaking the page
/// over.
#[derive(Debug, Clone)]
pub struct GuestStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> GuestStore<S> {
    /// Wrap a storage area.
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Read the guest cart array, or empty if absent or corrupt.
    pub fn read_cart(&self) -> Vec<CartLineItem> {
        self.read_array(keys::CART_ITEMS)
    }

    /// Persist the full guest cart array.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage write fails; the
    /// previously stored value is left unchanged.
    pub fn write_cart(&self, items: &[CartLineItem]) -> Result<(), StoreError> {
        self.write_array(keys::CART_ITEMS, items)
    }

    /// Drop the guest cart array entirely (merge-on-login drain).
    pub fn clear_cart(&self) {
        self.storage.remove(keys::CART_ITEMS);
    }

    /// Read the guest wishlist array, or empty if absent or corrupt.
    pub fn read_wishlist(&self) -> Vec<WishlistEntry> {
        self.read_array(keys::WISHLIST_ITEMS)
    }

    /// Persist the full guest wishlist array.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::write_cart`].
    pub fn write_wishlist(&self, entries: &[WishlistEntry]) -> Result<(), StoreError> {
        self.write_array(keys::WISHLIST_ITEMS, entries)
    }

    fn read_array<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let Some(raw) = self.storage.get(key) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt guest storage payload, reading as empty");
                Vec::new()
            }
        }
    }

    fn write_array<T: Serialize>(&self, key: &str, items: &[T]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(items).map_err(|e| {
            tracing::warn!(key, error = %e, "failed to serialize guest storage payload");
            StoreError::Storage(e.to_string())
        })?;
        self.storage.set(key, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sable_core::{ItemId, Price, ProductId, SizeId};

    fn line(product: i32, size: i32) -> CartLineItem {
        CartLineItem {
            id: ItemId::random(),
            product_id: ProductId::new(product),
            size_id: SizeId::new(size),
            quantity: 1,
            price: Price::new("10.00".parse::<Decimal>().unwrap()),
            name: "Linen Shirt".to_string(),
            image_url: None,
        }
    }

    #[test]
    fn cart_round_trips_through_storage() {
        let store = GuestStore::new(MemoryStorage::new());
        let items = vec![line(1, 1), line(2, 3)];
        store.write_cart(&items).unwrap();
        assert_eq!(store.read_cart(), items);
    }

    #[test]
    fn missing_key_reads_as_empty() {
        let store = GuestStore::new(MemoryStorage::new());
        assert!(store.read_cart().is_empty());
        assert!(store.read_wishlist().is_empty());
    }

    #[test]
    fn corrupt_payload_reads_as_empty() {
        let storage = MemoryStorage::new();
        storage.set(keys::CART_ITEMS, "{not json").unwrap();
        let store = GuestStore::new(storage);
        assert!(store.read_cart().is_empty());
    }

    #[test]
    fn clear_cart_removes_only_the_cart_key() {
        let storage = MemoryStorage::new();
        storage.set(keys::TOKEN, "tok").unwrap();
        let store = GuestStore::new(storage.clone());
        store.write_cart(&[line(1, 1)]).unwrap();
        store.clear_cart();
        assert!(storage.get(keys::CART_ITEMS).is_none());
        assert_eq!(storage.get(keys::TOKEN).as_deref(), Some("tok"));
    }

    #[test]
    fn clones_share_one_storage_area() {
        let a = MemoryStorage::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").as_deref(), Some("v"));
    }
}
