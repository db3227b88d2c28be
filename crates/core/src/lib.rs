//! Sable Core - Shared types library.
//!
//! This crate provides the common types used across all Sable client
//! components:
//! - `storefront` - cart/wishlist reconciliation engines and API client
//! - the embedding UI hosts (server-side rendering or WASM shells)
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP
//! clients, no storage access. This keeps it lightweight and allows it
//! to be used anywhere, including inside test fakes.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, cart lines,
//!   wishlist entries, and size availability sets

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
