//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Cart lines and
//! wishlist entries additionally need [`ItemId`], which can hold either a
//! server-assigned database id or a locally minted guest token.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>` and `Into<i32>` implementations
///
/// # Example
///
/// ```rust
/// # use sable_core::define_id;
/// define_id!(ProductId);
/// define_id!(SizeId);
///
/// let product_id = ProductId::new(1);
/// let size_id = SizeId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = size_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(ProductId);
define_id!(SizeId);

/// Identifier for a cart line or wishlist entry.
///
/// Guest-created items carry a locally minted random token until the
/// merge-on-login drain hands them to the server; server-owned items carry
/// the backend's numeric database id. The untagged serde representation
/// round-trips both forms: a JSON number deserializes to [`Self::Server`],
/// a JSON string to [`Self::Local`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    /// Server-assigned database id.
    Server(i64),
    /// Locally minted guest token.
    Local(String),
}

impl ItemId {
    /// Mint a fresh local token for a guest-created item.
    #[must_use]
    pub fn random() -> Self {
        Self::Local(Uuid::new_v4().to_string())
    }

    /// Whether this id was minted locally (guest mode).
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(token) => write!(f, "{token}"),
        }
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self::Server(id)
    }
}
