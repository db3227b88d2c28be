//! Error taxonomy for store operations.
//!
//! Precondition failures (`AuthRequired`, `InvalidQuantity`) are returned
//! synchronously before any network call, so callers can tell "you must
//! sign in" apart from "the backend is unreachable" by variant alone.

use thiserror::Error;

/// Errors surfaced by the cart/wishlist engines and the API client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP transport failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned a non-success status.
    #[error("API returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body for diagnostics.
        body: String,
    },

    /// Response payload failed to parse.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The operation requires a signed-in session.
    #[error("sign in required")]
    AuthRequired,

    /// Quantity below the floor of 1.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(u32),

    /// Guest storage read/write failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Referenced item does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Whether this error is a synchronous precondition failure rather
    /// than a transport or backend fault.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::AuthRequired | Self::InvalidQuantity(_))
    }
}
