//! Core types for the Sable storefront client.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod availability;
pub mod cart;
pub mod id;
pub mod price;
pub mod wishlist;

pub use availability::{AvailabilitySet, SizeOption};
pub use cart::{CartLineItem, ItemDisplay};
pub use id::*;
pub use price::Price;
pub use wishlist::{ProductSummary, WishlistEntry};
