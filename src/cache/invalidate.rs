//! Mutation-driven cache invalidation.

use std::sync::Arc;

use metrics::counter;
use tracing::warn;
use uuid::Uuid;

use super::counters::CounterStore;
use super::keys;
use super::store::QueryCache;

const METRIC_CACHE_ERROR: &str = "foglio_cache_error_total";

/// Maps a committed mutation to the cache keys that must be dropped.
///
/// The mutation path awaits `on_mutation` after the durable write commits and
/// before the result is returned to the caller. That ordering is the
/// correctness-critical part: acknowledging first would let a concurrent
/// reader repopulate the cache from pre-mutation data that then outlives this
/// invalidation.
pub struct CacheInvalidator {
    cache: Arc<dyn QueryCache>,
    counters: Arc<dyn CounterStore>,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<dyn QueryCache>, counters: Arc<dyn CounterStore>) -> Self {
        Self { cache, counters }
    }

    /// Drop every cache entry derived from the mutated record: its detail
    /// projection, the unscoped list pages, and the list pages scoped to its
    /// author. List entries embed hashed filter/pagination parameters, so the
    /// latter two are prefix deletions.
    ///
    /// Failures are logged and swallowed: the cache is never authoritative
    /// and a surviving stale entry expires with its TTL.
    pub async fn on_mutation(&self, post_id: Uuid, author_id: Uuid) {
        let patterns = [
            keys::detail_key(post_id),
            keys::list_prefix_all(),
            keys::list_prefix_author(author_id),
        ];

        for pattern in patterns {
            if let Err(err) = self.cache.delete_matching(&pattern).await {
                counter!(METRIC_CACHE_ERROR).increment(1);
                warn!(
                    target = "cache::invalidate",
                    %post_id,
                    pattern = %pattern,
                    error = %err,
                    "cache invalidation failed; entry will age out via TTL"
                );
            }
        }
    }

    /// Reseed a record's counter baseline after the reconciliation path wrote
    /// `view_count` directly. Set-if-absent semantics make this a no-op for
    /// counters that are still live.
    pub async fn reseed_counter(&self, post_id: Uuid, persisted: i64) {
        if let Err(err) = self.counters.seed(post_id, persisted).await {
            warn!(
                target = "cache::invalidate",
                %post_id,
                error = %err,
                "counter reseed failed"
            );
        }
    }
}
