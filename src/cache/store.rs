//! Cache-aside query store contract.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::VolatileError;

/// TTL'd key-value store for computed query results.
///
/// Entries are derived data and always safe to discard; callers repopulate on
/// the next miss. `delete_matching` is prefix-scoped because list keys embed
/// hashed filter/pagination parameters that cannot be enumerated precisely.
///
/// A `set` racing a concurrent `delete_matching` under the same prefix may or
/// may not survive the delete; the short entry TTL bounds how long such a
/// stale survivor can live. A `set` that starts after the delete returned is
/// not required to survive a second delete of the same pattern.
#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, VolatileError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), VolatileError>;

    /// Delete every entry whose key starts with `prefix`.
    async fn delete_matching(&self, prefix: &str) -> Result<(), VolatileError>;
}

/// Serialize a query result for caching.
pub fn encode_cached<T: Serialize>(value: &T) -> Result<Vec<u8>, VolatileError> {
    serde_json::to_vec(value).map_err(|err| VolatileError::codec(err.to_string()))
}

/// Deserialize a cached query result.
pub fn decode_cached<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, VolatileError> {
    serde_json::from_slice(bytes).map_err(|err| VolatileError::codec(err.to_string()))
}
