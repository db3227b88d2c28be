//! Session context: the ownership-mode seam.
//!
//! Whether the cart/wishlist engines talk to guest storage or the remote
//! API is derived, never stored: `is_authenticated()` re-reads the
//! persisted token on every call, so a login or logout mid-session
//! redirects the very next operation to the other store.

use secrecy::SecretString;

use crate::storage::{KeyValueStorage, keys};

/// Read-only view of the persisted session credential.
///
/// Constructed once by the embedder and injected into each engine, so
/// business logic never reaches into ambient global state.
#[derive(Debug, Clone)]
pub struct SessionContext<S> {
    storage: S,
}

impl<S: KeyValueStorage> SessionContext<S> {
    /// Wrap the storage area holding the `token` key.
    pub const fn new(storage: S) -> Self {
        Self { storage }
    }

    /// The current bearer token, if one is persisted.
    ///
    /// An empty stored value counts as signed out.
    pub fn token(&self) -> Option<SecretString> {
        self.storage
            .get(keys::TOKEN)
            .filter(|raw| !raw.is_empty())
            .map(SecretString::from)
    }

    /// Whether a session token is currently present.
    ///
    /// Token validity is the backend's concern; an expired token shows up
    /// as a failed authenticated call, handled by the global HTTP error
    /// interceptor outside this crate.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}
