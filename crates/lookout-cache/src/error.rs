//! Error types for the cache layer.
//!
//! Every backend returns the same [`CacheError`] so callers never need to know
//! which physical store served a request.

use std::time::Duration;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store could not be reached within its connect timeout.
    #[error("failed to connect to {target}: {message}")]
    Connection {
        /// The node address or node list that was dialed.
        target: String,
        /// Description of the connection failure.
        message: String,
    },

    /// The store is reachable but is not running in cluster mode.
    #[error("{target} does not have cluster support enabled")]
    ClusterUnsupported {
        /// The node that reported the missing capability.
        target: String,
    },

    /// The requested key does not exist (or has expired).
    #[error("key not found: {0}")]
    NotFound(String),

    /// A value could not be encoded to or decoded from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store rejected a command.
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// No pooled connection could be obtained.
    #[error("connection pool error: {0}")]
    Pool(String),

    /// A live-backend command did not complete within the operation timeout.
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),

    /// The in-process fallback is serving requests; no external store is connected.
    #[error("degraded mode: {0}")]
    Degraded(String),
}

impl CacheError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(target: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Connection {
            target: target.into(),
            message: message.to_string(),
        }
    }

    /// Returns `true` for a cache miss.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` when the store could not be reached at all.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Pool(_))
    }
}
