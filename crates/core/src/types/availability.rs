//! Per-product size availability.

use serde::{Deserialize, Serialize};

use crate::types::id::SizeId;

/// A sellable size variant of a product, with its live stock flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeOption {
    /// Size variant id.
    pub size_id: SizeId,
    /// Human-readable size label (e.g., "M", "XL").
    pub name: String,
    /// Whether the warehouse currently has stock.
    pub in_stock: bool,
}

/// The ordered size list fetched for one product.
///
/// Treated as immutable for the duration of a cart session: the resolver
/// never refreshes a cached set on its own, so server-side stock changes
/// are not visible until an explicit reload evicts the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AvailabilitySet {
    sizes: Vec<SizeOption>,
}

impl AvailabilitySet {
    /// Wrap a fetched size list.
    #[must_use]
    pub const fn new(sizes: Vec<SizeOption>) -> Self {
        Self { sizes }
    }

    /// All sizes in catalog order.
    #[must_use]
    pub fn sizes(&self) -> &[SizeOption] {
        &self.sizes
    }

    /// Whether the given size is present and in stock.
    #[must_use]
    pub fn in_stock(&self, size_id: SizeId) -> bool {
        self.sizes
            .iter()
            .any(|s| s.size_id == size_id && s.in_stock)
    }

    /// Whether the given size is listed at all (in stock or not).
    #[must_use]
    pub fn contains(&self, size_id: SizeId) -> bool {
        self.sizes.iter().any(|s| s.size_id == size_id)
    }
}

impl From<Vec<SizeOption>> for AvailabilitySet {
    fn from(sizes: Vec<SizeOption>) -> Self {
        Self::new(sizes)
    }
}
