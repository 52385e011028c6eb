//! The uniform cache contract.
//!
//! Session middleware, the query-result memoizer, invalidation logic and lock
//! users all hold an `Arc<dyn CacheStore>` and never learn which concrete
//! backend (or supervisor) sits behind it.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CacheError;
use crate::keys;
use crate::metrics;
use crate::types::{BackendKind, CacheMemoryInfo, CacheValue, UserSession};

/// Capability set every cache backend implements.
///
/// A `ttl` of [`Duration::ZERO`] means "use the backend's configured default".
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The physical store currently serving calls.
    fn kind(&self) -> BackendKind;

    // ==================== Generic cache ====================

    /// Get the stored payload.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NotFound` for absent or expired keys.
    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError>;

    /// Store a payload, replacing any previous value.
    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<(), CacheError>;

    /// Remove a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    // ==================== Sessions ====================

    /// Store a session under `session:<id>` for 24 hours and index it under
    /// its tenant. `last_activity` is stamped with the current time.
    async fn set_session(&self, session: &mut UserSession) -> Result<(), CacheError>;

    /// Look up a session by ID (the bearer token).
    async fn get_session(&self, session_id: &str) -> Result<UserSession, CacheError> {
        let data = match self.get(&keys::session(session_id)).await {
            Ok(data) => data,
            Err(e) => {
                metrics::record_operation("get_session", "miss");
                return Err(e);
            }
        };
        match serde_json::from_slice(&data) {
            Ok(session) => {
                metrics::record_operation("get_session", "hit");
                Ok(session)
            }
            Err(e) => {
                metrics::record_operation("get_session", "error");
                Err(e.into())
            }
        }
    }

    /// Delete a session and drop it from its tenant index.
    async fn invalidate_session(&self, session_id: &str) -> Result<(), CacheError>;

    /// List the live sessions of a tenant.
    ///
    /// The tenant index is best-effort: IDs that no longer resolve to a session
    /// are skipped and pruned from the index as a side effect.
    async fn get_active_sessions(&self, tenant_id: &str) -> Result<Vec<UserSession>, CacheError>;

    // ==================== Query results ====================

    /// Memoize a query result under `query_cache:<hash>`.
    async fn cache_query_result(
        &self,
        query_hash: &str,
        result: CacheValue,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.set(&keys::query_cache(query_hash), result, ttl).await
    }

    async fn get_cached_query_result(&self, query_hash: &str) -> Result<Vec<u8>, CacheError> {
        self.get(&keys::query_cache(query_hash)).await
    }

    // ==================== Locks ====================

    /// Try to take `lock:<key>` for `ttl`. Returns `false` if another holder has it.
    async fn acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    async fn release_lock(&self, key: &str) -> Result<(), CacheError>;

    // ==================== Pattern index ====================

    /// Add `cache_key` to the group `pattern`. Adding an existing member is a no-op.
    async fn add_to_pattern_index(&self, pattern: &str, cache_key: &str)
    -> Result<(), CacheError>;

    /// Members of `pattern`; an unknown pattern yields an empty list.
    async fn get_pattern_index_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Drop the grouping only. Member entries are left in place.
    async fn delete_pattern_index(&self, pattern: &str) -> Result<(), CacheError>;

    /// Delete every key, continuing past individual failures.
    async fn delete_multiple(&self, keys: &[String]) -> Result<(), CacheError>;

    // ==================== Diagnostics ====================

    /// Liveness probe. An error signals degraded operation to monitoring.
    async fn health_check(&self) -> Result<(), CacheError>;

    async fn get_memory_info(&self) -> Result<CacheMemoryInfo, CacheError>;

    /// Re-apply `ttl` to every key matching the glob `pattern`.
    async fn adjust_cache_ttl(&self, pattern: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Remove expired keys matching the glob `pattern`, returning how many were removed.
    ///
    /// Redis evicts expired keys on its own and reports them as absent, so only
    /// keys caught with exactly zero milliseconds left are deleted here. The
    /// count is usually `0`; callers should treat this as a maintenance hook
    /// rather than a measure of how much was reclaimed.
    async fn cleanup_expired_entries(&self, pattern: &str) -> Result<u64, CacheError>;

    // ==================== Lifecycle ====================

    /// Release background resources. Safe to call more than once.
    async fn shutdown(&self);
}

/// Typed helpers layered over any [`CacheStore`].
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.set(key, CacheValue::json(value)?, ttl).await
    }

    async fn get_json<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        let data = self.get(key).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    async fn cache_query_json<T>(
        &self,
        query_hash: &str,
        result: &T,
        ttl: Duration,
    ) -> Result<(), CacheError>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.cache_query_result(query_hash, CacheValue::json(result)?, ttl)
            .await
    }

    async fn get_cached_query_json<T>(&self, query_hash: &str) -> Result<T, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        let data = self.get_cached_query_result(query_hash).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Delete every member of `pattern`, then the grouping itself.
    ///
    /// This is the list-then-bulk-delete protocol and is not atomic: a key added
    /// to the group after the listing but before the index is dropped keeps
    /// its cache entry and loses its group membership. Callers that cannot
    /// tolerate that should hold a lock on the pattern across writes and
    /// invalidation.
    ///
    /// Returns the number of member keys that were submitted for deletion.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let members = self.get_pattern_index_keys(pattern).await?;
        self.delete_multiple(&members).await?;
        self.delete_pattern_index(pattern).await?;
        tracing::debug!(pattern = %pattern, keys = members.len(), "pattern invalidated");
        Ok(members.len())
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}
