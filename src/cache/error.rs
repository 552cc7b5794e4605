use std::time::Duration;

use thiserror::Error;

/// Failures on the volatile-store path.
///
/// These are transient by definition and never reach a caller as a request
/// failure: counter reads fall back to the persisted value, counter
/// increments are logged and dropped, and cache misses degrade to a durable
/// read.
#[derive(Debug, Error)]
pub enum VolatileError {
    #[error("volatile store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("volatile store error: {0}")]
    Store(String),
    #[error("cached value could not be decoded: {0}")]
    Codec(String),
}

impl VolatileError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }
}
