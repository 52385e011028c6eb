//! Key namespaces used by the cache layer.

use std::time::Duration;

/// Sessions live for 24 hours regardless of the configured default TTL.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn session(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// Set of session IDs per tenant on live backends.
pub fn tenant_sessions(tenant_id: &str) -> String {
    format!("tenant_sessions:{tenant_id}")
}

pub fn query_cache(query_hash: &str) -> String {
    format!("query_cache:{query_hash}")
}

pub fn lock(key: &str) -> String {
    format!("lock:{key}")
}

/// Emulated tenant index on the fallback backend (serialized list of IDs).
pub fn fallback_active_sessions(tenant_id: &str) -> String {
    format!("active_sessions:{tenant_id}")
}

/// Emulated pattern index on the fallback backend (serialized list of keys).
pub fn fallback_set(pattern: &str) -> String {
    format!("set:{pattern}")
}
