use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::cache::{CounterStore, QueryCache, VolatileError};

/// In-process counters and query cache.
///
/// Correct only when a single instance serves all traffic; the counters are
/// not visible across processes. Entries expire lazily on read, with
/// `delete_matching` and `set` providing the same observable semantics as the
/// Redis store.
#[derive(Default)]
pub struct MemoryVolatileStore {
    counters: DashMap<Uuid, i64>,
    entries: DashMap<String, CacheSlot>,
}

struct CacheSlot {
    value: Vec<u8>,
    expires_at: Instant,
}

impl MemoryVolatileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryVolatileStore {
    async fn increment(&self, post_id: Uuid) -> Result<i64, VolatileError> {
        let mut entry = self.counters.entry(post_id).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn read(&self, post_id: Uuid) -> Result<Option<i64>, VolatileError> {
        Ok(self.counters.get(&post_id).map(|value| *value))
    }

    async fn seed(&self, post_id: Uuid, baseline: i64) -> Result<(), VolatileError> {
        // The entry API locks the shard for the whole call, giving the same
        // set-if-absent atomicity as SET NX.
        self.counters.entry(post_id).or_insert(baseline);
        Ok(())
    }

    async fn scan_counters(&self) -> Result<Vec<(Uuid, i64)>, VolatileError> {
        Ok(self
            .counters
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect())
    }
}

#[async_trait]
impl QueryCache for MemoryVolatileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VolatileError> {
        if let Some(slot) = self.entries.get(key) {
            if slot.expires_at > Instant::now() {
                return Ok(Some(slot.value.clone()));
            }
        }
        // Expired entries are removed on the read that notices them.
        self.entries
            .remove_if(key, |_, slot| slot.expires_at <= Instant::now());
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), VolatileError> {
        self.entries.insert(
            key.to_string(),
            CacheSlot {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete_matching(&self, prefix: &str) -> Result<(), VolatileError> {
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_seeds_lazily_and_counts_up() {
        let store = MemoryVolatileStore::new();
        let id = Uuid::new_v4();

        assert_eq!(store.read(id).await.expect("read"), None);
        assert_eq!(store.increment(id).await.expect("incr"), 1);
        assert_eq!(store.increment(id).await.expect("incr"), 2);
        assert_eq!(store.read(id).await.expect("read"), Some(2));
    }

    #[tokio::test]
    async fn seed_is_set_if_absent() {
        let store = MemoryVolatileStore::new();
        let id = Uuid::new_v4();

        store.seed(id, 40).await.expect("seed");
        assert_eq!(store.increment(id).await.expect("incr"), 41);

        // A second seed must not clobber observed increments.
        store.seed(id, 40).await.expect("seed");
        assert_eq!(store.read(id).await.expect("read"), Some(41));
    }

    #[tokio::test]
    async fn cache_round_trip_and_ttl_expiry() {
        let store = MemoryVolatileStore::new();

        store
            .set("q:post:a", b"cached".to_vec(), Duration::from_millis(30))
            .await
            .expect("set");
        assert_eq!(
            store.get("q:post:a").await.expect("get"),
            Some(b"cached".to_vec())
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.get("q:post:a").await.expect("get"), None);
    }

    #[tokio::test]
    async fn delete_matching_is_prefix_scoped() {
        let store = MemoryVolatileStore::new();
        let ttl = Duration::from_secs(60);

        store.set("q:list:all:1", b"a".to_vec(), ttl).await.unwrap();
        store.set("q:list:all:2", b"b".to_vec(), ttl).await.unwrap();
        store.set("q:post:x", b"c".to_vec(), ttl).await.unwrap();

        store.delete_matching("q:list:all:").await.unwrap();

        assert_eq!(store.get("q:list:all:1").await.unwrap(), None);
        assert_eq!(store.get("q:list:all:2").await.unwrap(), None);
        assert_eq!(store.get("q:post:x").await.unwrap(), Some(b"c".to_vec()));
    }
}
