//! The event-store seam shared by producers and the drain worker.

use crate::{DatabaseResult, PendingEvent};

/// Durable queue of pending events.
///
/// Producers only call [`append`](EventStore::append); only the drain worker
/// calls [`claim_and_remove`](EventStore::claim_and_remove).
pub trait EventStore: Send + Sync {
    /// Whether the store has been provisioned and can be used.
    fn is_ready(&self) -> bool;

    /// Insert one row with a fresh id.
    ///
    /// Fails with [`DatabaseError::NotReady`](crate::DatabaseError::NotReady)
    /// when the store is not provisioned.
    fn append(&self, payload: &str) -> DatabaseResult<i64>;

    /// Atomically take every pending row in ascending id order.
    ///
    /// Returns an empty batch, leaving the store unchanged, when the
    /// consistency check fails.
    fn claim_and_remove(&self) -> DatabaseResult<Vec<PendingEvent>>;

    /// Number of rows currently pending.
    fn pending_count(&self) -> DatabaseResult<usize>;
}
