//! Periodic reconciliation of live counters into the durable store.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, warn};

use crate::application::repos::{PostsWriteRepo, RepoError};
use crate::cache::{CacheInvalidator, CounterStore, VolatileError};

const METRIC_RECONCILE_RATCHET: &str = "foglio_reconcile_ratchet_total";
const METRIC_RECONCILE_FAILED: &str = "foglio_reconcile_failed_total";
const METRIC_RECONCILE_PASS_MS: &str = "foglio_reconcile_pass_ms";

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Counters enumerated from the volatile store.
    pub scanned: usize,
    /// Ratchet updates that committed.
    pub ratcheted: usize,
    /// Counters whose record no longer exists in the durable store.
    pub skipped: usize,
    /// Ratchet updates that failed; the pass continued past them.
    pub failed: usize,
}

impl ReconcileOutcome {
    /// Full success is what maps to exit code 0 for the scheduled job.
    pub fn fully_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The counter enumeration itself failed; no per-record work happened.
    /// The job is idempotent, so the scheduler simply re-invokes it.
    #[error("counter scan failed: {0}")]
    Scan(#[from] VolatileError),
}

/// Drains live counters into the durable store.
///
/// Each record is an independent idempotent ratchet
/// (`view_count = GREATEST(view_count, observed)`), so the pass needs no
/// global lock, tolerates overlapping invocations from the scheduler, and can
/// never move a count backward. Counters are left in place after draining:
/// they remain the running totals, and increments that land mid-pass are
/// picked up on the next cycle. The cost is a staleness window bounded by the
/// job period; the benefit is that no increment can be lost to a
/// read-reset race.
#[derive(Clone)]
pub struct Reconciler {
    posts_write: Arc<dyn PostsWriteRepo>,
    counters: Arc<dyn CounterStore>,
    invalidator: Arc<CacheInvalidator>,
}

impl Reconciler {
    pub fn new(
        posts_write: Arc<dyn PostsWriteRepo>,
        counters: Arc<dyn CounterStore>,
        invalidator: Arc<CacheInvalidator>,
    ) -> Self {
        Self {
            posts_write,
            counters,
            invalidator,
        }
    }

    pub async fn run_pass(&self) -> Result<ReconcileOutcome, ReconcileError> {
        let started_at = Instant::now();
        let entries = self.counters.scan_counters().await?;

        let mut outcome = ReconcileOutcome {
            scanned: entries.len(),
            ..Default::default()
        };

        for (post_id, observed) in entries {
            if observed <= 0 {
                continue;
            }

            match self.posts_write.ratchet_view_count(post_id, observed).await {
                Ok(()) => {
                    outcome.ratcheted += 1;
                    counter!(METRIC_RECONCILE_RATCHET).increment(1);
                    // The counter was seeded from a persisted baseline and
                    // keeps running; reseeding after the durable write is a
                    // set-if-absent no-op unless the volatile store lost the
                    // entry since the scan.
                    self.invalidator.reseed_counter(post_id, observed).await;
                }
                Err(RepoError::NotFound) => {
                    outcome.skipped += 1;
                    warn!(
                        target = "application::reconcile",
                        %post_id,
                        "counter refers to a record the durable store no longer has"
                    );
                }
                Err(err) => {
                    outcome.failed += 1;
                    counter!(METRIC_RECONCILE_FAILED).increment(1);
                    warn!(
                        target = "application::reconcile",
                        %post_id,
                        observed,
                        error = %err,
                        "ratchet update failed; continuing with remaining records"
                    );
                }
            }
        }

        histogram!(METRIC_RECONCILE_PASS_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        info!(
            target = "application::reconcile",
            scanned = outcome.scanned,
            ratcheted = outcome.ratcheted,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "reconciliation pass finished"
        );

        Ok(outcome)
    }
}
