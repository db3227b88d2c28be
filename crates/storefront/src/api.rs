//! Backend REST API client.
//!
//! The engines talk to the backend through the [`CartApi`],
//! [`WishlistApi`], and [`WarehouseApi`] traits so tests can substitute
//! in-process fakes; [`ApiClient`] is the production implementation over
//! `reqwest`.
//!
//! Authenticated routes carry `Authorization: Bearer <token>` with the
//! token read from the injected [`SessionContext`] at request-build time.
//! A call that requires a token while the session is signed out fails
//! fast with [`StoreError::AuthRequired`] before any I/O.

use std::future::Future;
use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use sable_core::{AvailabilitySet, CartLineItem, ItemId, ProductId, SizeId, WishlistEntry};

use crate::config::ApiConfig;
use crate::error::StoreError;
use crate::session::SessionContext;
use crate::storage::KeyValueStorage;

// =============================================================================
// Wire types
// =============================================================================

/// The variant-and-quantity triple submitted for cart creation and merge.
///
/// Display fields are never submitted; the server rebuilds canonical
/// lines from its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemPayload {
    /// Product id.
    pub product_id: ProductId,
    /// Size variant id.
    pub size_id: SizeId,
    /// Units requested.
    pub quantity: u32,
}

impl From<&CartLineItem> for CartItemPayload {
    fn from(item: &CartLineItem) -> Self {
        Self {
            product_id: item.product_id,
            size_id: item.size_id,
            quantity: item.quantity,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MergeCartRequest {
    guest_cart: Vec<CartItemPayload>,
}

#[derive(Debug, Serialize)]
struct UpdateQuantityRequest {
    quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSizeRequest {
    size_id: SizeId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddWishlistRequest {
    product_id: ProductId,
}

// =============================================================================
// API traits
// =============================================================================

/// Remote cart resource, scoped to the signed-in user.
pub trait CartApi: Send + Sync {
    /// Fetch the user's full cart.
    fn fetch_cart(&self) -> impl Future<Output = Result<Vec<CartLineItem>, StoreError>> + Send;

    /// Add one variant to the cart; the server decides quantity-merge.
    fn add_cart_item(
        &self,
        item: CartItemPayload,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete one cart line by id.
    fn delete_cart_item(&self, id: &ItemId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replace one line's quantity.
    fn update_cart_item_quantity(
        &self,
        id: &ItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Replace one line's size variant.
    fn update_cart_item_size(
        &self,
        id: &ItemId,
        size_id: SizeId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Submit a drained guest cart for server-side merge.
    fn merge_cart(
        &self,
        guest_cart: Vec<CartItemPayload>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Remote wishlist resource, scoped to the signed-in user.
pub trait WishlistApi: Send + Sync {
    /// Fetch the user's full wishlist.
    fn fetch_wishlist(&self)
    -> impl Future<Output = Result<Vec<WishlistEntry>, StoreError>> + Send;

    /// Add a product to the wishlist.
    fn add_wishlist_entry(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete one entry by id.
    fn delete_wishlist_entry(
        &self,
        id: &ItemId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete whatever entry references the product, if any.
    fn delete_wishlist_by_product(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Public warehouse availability resource (unauthenticated).
pub trait WarehouseApi: Send + Sync {
    /// Fetch the sellable size list for a product.
    fn fetch_product_sizes(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<AvailabilitySet, StoreError>> + Send;
}

// =============================================================================
// ApiClient
// =============================================================================

/// Production REST client for the backend API.
///
/// Cheaply cloneable; all clones share one connection pool.
pub struct ApiClient<S> {
    inner: Arc<ApiClientInner<S>>,
}

impl<S> Clone for ApiClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ApiClientInner<S> {
    client: reqwest::Client,
    root: String,
    session: SessionContext<S>,
}

impl<S: KeyValueStorage> ApiClient<S> {
    /// Create a client for the configured API root.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ApiConfig, session: SessionContext<S>) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let root = config.api_root.as_str().trim_end_matches('/').to_string();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                root,
                session,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.inner.root)
    }

    /// Bearer header value, or `AuthRequired` when signed out.
    fn bearer(&self) -> Result<String, StoreError> {
        let token = self.inner.session.token().ok_or(StoreError::AuthRequired)?;
        Ok(format!("Bearer {}", token.expose_secret()))
    }

    /// Send a request and surface non-success statuses as typed errors.
    async fn send_checked(&self, request: reqwest::RequestBuilder) -> Result<String, StoreError> {
        let response = request.send().await?;
        let status = response.status();

        // Body as text first for better error diagnostics
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %excerpt(&text, 500),
                "backend returned non-success status"
            );
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: excerpt(&text, 200),
            });
        }

        Ok(text)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, StoreError> {
        let text = self.send_checked(request).await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(&text, 500),
                "failed to parse backend response"
            );
            StoreError::Parse(e)
        })
    }
}

fn excerpt(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

impl<S: KeyValueStorage> CartApi for ApiClient<S> {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<Vec<CartLineItem>, StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .get(self.endpoint("/cart/my"))
            .header("Authorization", bearer);
        self.get_json(request).await
    }

    #[instrument(skip(self))]
    async fn add_cart_item(&self, item: CartItemPayload) -> Result<(), StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .post(self.endpoint("/cart"))
            .header("Authorization", bearer)
            .json(&item);
        self.send_checked(request).await.map(drop)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn delete_cart_item(&self, id: &ItemId) -> Result<(), StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .delete(self.endpoint(&format!("/cart/{id}")))
            .header("Authorization", bearer);
        self.send_checked(request).await.map(drop)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn update_cart_item_quantity(
        &self,
        id: &ItemId,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .put(self.endpoint(&format!("/cart/{id}")))
            .header("Authorization", bearer)
            .json(&UpdateQuantityRequest { quantity });
        self.send_checked(request).await.map(drop)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn update_cart_item_size(&self, id: &ItemId, size_id: SizeId) -> Result<(), StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .put(self.endpoint(&format!("/cart/{id}/size")))
            .header("Authorization", bearer)
            .json(&UpdateSizeRequest { size_id });
        self.send_checked(request).await.map(drop)
    }

    #[instrument(skip(self, guest_cart), fields(lines = guest_cart.len()))]
    async fn merge_cart(&self, guest_cart: Vec<CartItemPayload>) -> Result<(), StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .post(self.endpoint("/cart/merge"))
            .header("Authorization", bearer)
            .json(&MergeCartRequest { guest_cart });
        self.send_checked(request).await.map(drop)
    }
}

impl<S: KeyValueStorage> WishlistApi for ApiClient<S> {
    #[instrument(skip(self))]
    async fn fetch_wishlist(&self) -> Result<Vec<WishlistEntry>, StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .get(self.endpoint("/wishlist/my"))
            .header("Authorization", bearer);
        self.get_json(request).await
    }

    #[instrument(skip(self))]
    async fn add_wishlist_entry(&self, product_id: ProductId) -> Result<(), StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .post(self.endpoint("/wishlist"))
            .header("Authorization", bearer)
            .json(&AddWishlistRequest { product_id });
        self.send_checked(request).await.map(drop)
    }

    #[instrument(skip(self), fields(item_id = %id))]
    async fn delete_wishlist_entry(&self, id: &ItemId) -> Result<(), StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .delete(self.endpoint(&format!("/wishlist/{id}")))
            .header("Authorization", bearer);
        self.send_checked(request).await.map(drop)
    }

    #[instrument(skip(self))]
    async fn delete_wishlist_by_product(&self, product_id: ProductId) -> Result<(), StoreError> {
        let bearer = self.bearer()?;
        let request = self
            .inner
            .client
            .delete(self.endpoint(&format!("/wishlist/product/{product_id}")))
            .header("Authorization", bearer);
        self.send_checked(request).await.map(drop)
    }
}

impl<S: KeyValueStorage> WarehouseApi for ApiClient<S> {
    // Public route: no bearer token.
    #[instrument(skip(self))]
    async fn fetch_product_sizes(
        &self,
        product_id: ProductId,
    ) -> Result<AvailabilitySet, StoreError> {
        let request = self
            .inner
            .client
            .get(self.endpoint(&format!("/public/warehouse/product/{product_id}/sizes")));
        self.get_json(request).await
    }
}
