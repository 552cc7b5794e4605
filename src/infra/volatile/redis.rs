use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::time::timeout;
use uuid::Uuid;

use crate::cache::keys;
use crate::cache::{CounterStore, QueryCache, VolatileError};
use crate::infra::error::InfraError;

/// Scans walk many keyspace pages; give them more room than point operations.
const SCAN_TIMEOUT_FACTOR: u32 = 10;

/// Redis-backed counters and query cache.
///
/// Every operation runs under a short timeout. The volatile store sits on the
/// hot read path, and a hung call here must degrade to the durable store
/// instead of stalling the request; the policy for what a failure means
/// (fall back, drop, force a durable read) lives with the callers.
#[derive(Clone)]
pub struct RedisVolatileStore {
    manager: ConnectionManager,
    op_timeout: Duration,
}

impl RedisVolatileStore {
    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, InfraError> {
        let client = redis::Client::open(url)
            .map_err(|err| InfraError::volatile(format!("invalid redis url: {err}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|err| InfraError::volatile(format!("redis connection failed: {err}")))?;

        Ok(Self {
            manager,
            op_timeout,
        })
    }

    async fn run<T, F>(&self, limit: Duration, op: F) -> Result<T, VolatileError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(limit, op).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(VolatileError::store(err.to_string())),
            Err(_) => Err(VolatileError::Timeout(limit)),
        }
    }

    fn scan_timeout(&self) -> Duration {
        self.op_timeout.saturating_mul(SCAN_TIMEOUT_FACTOR)
    }

    async fn scan_keys(&self, pattern: String) -> Result<Vec<String>, VolatileError> {
        let mut conn = self.manager.clone();
        self.run(self.scan_timeout(), async move {
            let mut keys = Vec::new();
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            Ok(keys)
        })
        .await
    }
}

#[async_trait]
impl CounterStore for RedisVolatileStore {
    async fn increment(&self, post_id: Uuid) -> Result<i64, VolatileError> {
        let mut conn = self.manager.clone();
        let key = keys::counter_key(post_id);
        self.run(self.op_timeout, async move { conn.incr(key, 1i64).await })
            .await
    }

    async fn read(&self, post_id: Uuid) -> Result<Option<i64>, VolatileError> {
        let mut conn = self.manager.clone();
        let key = keys::counter_key(post_id);
        self.run(self.op_timeout, async move { conn.get(key).await })
            .await
    }

    async fn seed(&self, post_id: Uuid, baseline: i64) -> Result<(), VolatileError> {
        let mut conn = self.manager.clone();
        let key = keys::counter_key(post_id);
        // SET NX: the atomic set-if-absent the contract requires. A plain
        // read-then-write would let a freshly incremented counter be clobbered
        // back to the baseline by a racing seeder.
        self.run(self.op_timeout, async move {
            conn.set_nx::<_, _, bool>(key, baseline).await.map(|_| ())
        })
        .await
    }

    async fn scan_counters(&self) -> Result<Vec<(Uuid, i64)>, VolatileError> {
        let scanned = self.scan_keys(keys::counter_pattern()).await?;

        let mut conn = self.manager.clone();
        self.run(self.scan_timeout(), async move {
            let mut entries = Vec::with_capacity(scanned.len());
            for key in scanned {
                let Some(post_id) = keys::post_id_from_counter_key(&key) else {
                    continue;
                };
                // Values are re-read after the scan; a counter incremented in
                // between is picked up at its newer value.
                let value: Option<i64> = conn.get(&key).await?;
                if let Some(value) = value {
                    entries.push((post_id, value));
                }
            }
            Ok(entries)
        })
        .await
    }
}

#[async_trait]
impl QueryCache for RedisVolatileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VolatileError> {
        let mut conn = self.manager.clone();
        let key = key.to_string();
        self.run(self.op_timeout, async move { conn.get(key).await })
            .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), VolatileError> {
        let mut conn = self.manager.clone();
        let key = key.to_string();
        let seconds = ttl.as_secs().max(1);
        self.run(self.op_timeout, async move {
            conn.set_ex::<_, _, ()>(key, value, seconds).await
        })
        .await
    }

    async fn delete_matching(&self, prefix: &str) -> Result<(), VolatileError> {
        let matched = self.scan_keys(format!("{prefix}*")).await?;
        if matched.is_empty() {
            return Ok(());
        }

        let mut conn = self.manager.clone();
        self.run(self.scan_timeout(), async move {
            conn.del::<_, ()>(matched).await
        })
        .await
    }
}
