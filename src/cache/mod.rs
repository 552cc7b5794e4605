//! Foglio cache-consistency layer.
//!
//! Keeps two kinds of volatile state next to the durable store:
//!
//! - **Live view counters**: per-record atomic counters absorbing the view
//!   stream; drained into the durable store by the reconciliation job.
//! - **Query cache**: cache-aside entries for detail and list reads with
//!   short TTLs, dropped (never updated in place) on every mutation.
//!
//! Both live behind traits so deployments can run against Redis (shared
//! across instances) or the in-process store (single instance, tests).
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `foglio.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! detail_ttl_secs = 1200
//! list_ttl_secs = 60
//! ```

mod config;
mod counters;
mod error;
mod invalidate;
pub mod keys;
mod store;

pub use config::CacheConfig;
pub use counters::CounterStore;
pub use error::VolatileError;
pub use invalidate::CacheInvalidator;
pub use store::{QueryCache, decode_cached, encode_cached};
