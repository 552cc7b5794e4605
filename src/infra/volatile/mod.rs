//! Volatile store implementations: live counters and the query cache.
//!
//! The Redis store is the deployment target — a single shared store visible
//! to every application instance, which is what makes the per-key atomics
//! meaningful across processes. The memory store backs single-instance
//! deployments and the test suite.

mod memory;
mod redis;

pub use memory::MemoryVolatileStore;
pub use redis::RedisVolatileStore;
