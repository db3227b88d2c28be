//! Single-flight guard for non-reentrant async operations.

use tokio::sync::{Mutex, MutexGuard};

/// Collapses concurrent callers of an operation onto one in-flight run.
///
/// The first caller to [`try_begin`](Self::try_begin) holds the flight
/// until the returned token drops; later callers get `None` and treat the
/// operation as already underway. Release is RAII, so every exit path of
/// the guarded operation (success, error, panic unwind) frees the flight.
#[derive(Debug, Default)]
pub struct SingleFlight {
    lock: Mutex<()>,
}

/// Token held for the duration of one guarded run.
#[derive(Debug)]
pub struct Flight<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl SingleFlight {
    /// Create an idle guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the flight, or `None` if a run is already in progress.
    ///
    /// Never waits: a collapsed caller is expected to no-op, not queue.
    pub fn try_begin(&self) -> Option<Flight<'_>> {
        self.lock.try_lock().ok().map(|guard| Flight { _guard: guard })
    }
}
