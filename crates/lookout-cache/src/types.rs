//! Data types shared by every cache backend.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::CacheError;

/// An authenticated user's server-side state.
///
/// The `id` doubles as the bearer token value presented by clients and as the
/// suffix of the session's cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub id: String,
    pub user_id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Stamped by the cache on every write.
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
    /// User-driven settings.
    #[serde(default, rename = "user_settings")]
    pub settings: HashMap<String, Value>,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub user_agent: String,
}

impl UserSession {
    /// Creates a new session with both timestamps set to now.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            roles: Vec::new(),
            created_at: now,
            last_activity: now,
            settings: HashMap::new(),
            ip_address: String::new(),
            user_agent: String::new(),
        }
    }

    /// Set the roles granted to this session.
    #[must_use]
    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// Memory usage information used for adaptive cache sizing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMemoryInfo {
    #[serde(rename = "used_memory_bytes")]
    pub used_memory: i64,
    #[serde(rename = "peak_memory_bytes")]
    pub peak_memory: i64,
    #[serde(rename = "memory_fragmentation_ratio")]
    pub memory_fragmentation: f64,
    pub total_keys: i64,
    pub expired_keys: i64,
    pub evicted_keys: i64,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

/// A value to be written to the cache.
///
/// Bytes and strings are stored verbatim; anything else goes through
/// [`CacheValue::json`] and must be JSON-decoded by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheValue(Vec<u8>);

impl CacheValue {
    /// Serialize a structured value as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, CacheError> {
        Ok(Self(serde_json::to_vec(value)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(value: &[u8]) -> Self {
        Self(value.to_vec())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

/// The physical store behind a [`CacheStore`](crate::CacheStore).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Sharded multi-node store.
    Cluster,
    /// One store endpoint.
    SingleNode,
    /// In-process map; the gateway is running degraded.
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cluster => write!(f, "cluster"),
            BackendKind::SingleNode => write!(f, "single_node"),
            BackendKind::Fallback => write!(f, "fallback"),
        }
    }
}
