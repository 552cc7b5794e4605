//! Live view-counter store contract.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::VolatileError;

/// Per-record atomic counters in the shared volatile store.
///
/// A counter holds the running total: the persisted baseline it was seeded
/// from plus every increment since. Reconciliation reads it and ratchets the
/// durable value upward; it never resets the counter, so increments that land
/// mid-pass are picked up on the next cycle.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter and return the post-increment value.
    async fn increment(&self, post_id: Uuid) -> Result<i64, VolatileError>;

    /// Read the current value, `None` when the counter has never been seeded.
    async fn read(&self, post_id: Uuid) -> Result<Option<i64>, VolatileError>;

    /// Seed the counter with a baseline, only if absent. Must be a single
    /// atomic set-if-not-exists, not a read followed by a write: two
    /// instances may seed concurrently and the loser's write has to be a
    /// no-op rather than a rollback of observed increments.
    async fn seed(&self, post_id: Uuid, baseline: i64) -> Result<(), VolatileError>;

    /// Enumerate all live counters for the reconciliation pass.
    async fn scan_counters(&self) -> Result<Vec<(Uuid, i64)>, VolatileError>;
}
