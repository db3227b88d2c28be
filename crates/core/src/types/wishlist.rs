//! Wishlist entry types.

use serde::{Deserialize, Serialize};

use crate::types::id::{ItemId, ProductId};
use crate::types::price::Price;

/// A single wishlist entry.
///
/// At most one entry exists per product per owner; membership is keyed
/// by `product_id`, not by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    /// Local token (guest) or server database id.
    pub id: ItemId,
    /// Product this entry refers to.
    pub product_id: ProductId,
    /// Product name for display.
    pub name: String,
    /// Unit price for display.
    pub price: Price,
    /// Product image for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// The product data a UI hands to `WishlistService::toggle`.
///
/// Carries the id plus the display fields needed to build a new entry
/// when the product is not yet wishlisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    /// Product id.
    pub id: ProductId,
    /// Product name as rendered.
    pub name: String,
    /// Unit price as rendered.
    pub price: Price,
    /// Product image as rendered, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ProductSummary {
    /// Build the wishlist entry this product would create, with a fresh
    /// local token.
    #[must_use]
    pub fn to_entry(&self) -> WishlistEntry {
        WishlistEntry {
            id: ItemId::random(),
            product_id: self.id,
            name: self.name.clone(),
            price: self.price,
            image_url: self.image_url.clone(),
        }
    }
}
