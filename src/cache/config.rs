//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_DETAIL_TTL_SECS: u64 = 1200;
const DEFAULT_LIST_TTL_SECS: u64 = 60;

/// Cache configuration from `foglio.toml`.
///
/// TTLs are deliberately short: they are the mitigation for the accepted
/// race between `delete_matching` and a concurrent `set` under the same
/// prefix. A stale entry that survives an invalidation lives at most one TTL.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the query cache. Counters are unaffected by this flag.
    pub enabled: bool,
    /// TTL for single-record detail entries.
    pub detail_ttl_secs: u64,
    /// TTL for list entries.
    pub list_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detail_ttl_secs: DEFAULT_DETAIL_TTL_SECS,
            list_ttl_secs: DEFAULT_LIST_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn detail_ttl(&self) -> Duration {
        Duration::from_secs(self.detail_ttl_secs.max(1))
    }

    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.detail_ttl_secs, 1200);
        assert_eq!(config.list_ttl_secs, 60);
    }

    #[test]
    fn zero_ttl_clamps_to_one_second() {
        let config = CacheConfig {
            list_ttl_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.list_ttl(), Duration::from_secs(1));
    }
}
