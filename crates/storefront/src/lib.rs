//! Sable storefront client - cart/wishlist reconciliation engines.
//!
//! # Architecture
//!
//! All business logic (pricing, stock, persistence, auth issuance) lives
//! in the backend REST API; this crate is the presentation-side
//! orchestration layer the UI embeds. It decides, per operation, whether
//! a cart or wishlist mutation goes to guest-local storage or to the
//! signed-in user's server-side resources, and performs the one-time
//! merge of guest state when a session begins.
//!
//! - [`storage`] - browser-storage seam and the guest store over it
//! - [`session`] - ownership mode, re-derived from the persisted token
//!   on every call
//! - [`api`] - REST client traits and the `reqwest` implementation
//! - [`cart`] - dual-mode cart engine with the single-flight
//!   merge-on-login drain
//! - [`wishlist`] - dual-mode wishlist engine (writes require sign-in)
//! - [`availability`] - per-product size/stock cache with a provisional
//!   fallback
//!
//! # Example
//!
//! ```rust,ignore
//! use sable_storefront::{
//!     api::ApiClient, availability::SizeResolver, cart::CartService,
//!     config::ApiConfig, session::SessionContext, storage::MemoryStorage,
//! };
//!
//! let storage = MemoryStorage::new();
//! let session = SessionContext::new(storage.clone());
//! let config = ApiConfig::from_env()?;
//! let api = ApiClient::new(&config, session.clone())?;
//!
//! let cart = CartService::new(api.clone(), storage.clone(), session.clone());
//! cart.load().await?;
//!
//! // On login (token now persisted), drain guest state exactly once:
//! cart.merge_on_login().await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod availability;
pub mod cart;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod wishlist;

pub use api::{ApiClient, CartApi, CartItemPayload, WarehouseApi, WishlistApi};
pub use availability::SizeResolver;
pub use cart::CartService;
pub use config::{ApiConfig, ConfigError};
pub use error::StoreError;
pub use session::SessionContext;
pub use storage::{GuestStore, KeyValueStorage, MemoryStorage};
pub use wishlist::WishlistService;
