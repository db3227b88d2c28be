//! Cart line item types.
//!
//! A cart holds at most one line per distinct `(product_id, size_id)`
//! pair; adding the same variant again increments the existing line's
//! quantity instead of appending a duplicate. The reconciliation engine
//! enforces this for guest carts; the backend enforces it server-side.

use serde::{Deserialize, Serialize};

use crate::types::id::{ItemId, ProductId, SizeId};
use crate::types::price::Price;

/// A single line in a cart.
///
/// Serialized in camelCase both on the wire and in guest storage under
/// the `cartItems` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    /// Local token (guest) or server database id.
    pub id: ItemId,
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Size variant of the product.
    pub size_id: SizeId,
    /// Units of this variant; always >= 1.
    pub quantity: u32,
    /// Unit price captured at add-time (guest) or returned by the server.
    pub price: Price,
    /// Product name for display.
    pub name: String,
    /// Product image for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartLineItem {
    /// Whether this line refers to the given `(product, size)` variant.
    #[must_use]
    pub fn matches_variant(&self, product_id: ProductId, size_id: SizeId) -> bool {
        self.product_id == product_id && self.size_id == size_id
    }

    /// Price x quantity for this line.
    #[must_use]
    pub fn line_total(&self) -> rust_decimal::Decimal {
        self.price.line_total(self.quantity)
    }
}

/// Display fields captured when a guest adds an item.
///
/// Guest carts have no server to denormalize from, so the UI hands the
/// engine whatever it was rendering at add-time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDisplay {
    /// Product name as rendered.
    pub name: String,
    /// Unit price as rendered.
    pub price: Price,
    /// Product image as rendered, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}
