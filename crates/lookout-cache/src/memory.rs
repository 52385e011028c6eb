//! In-process fallback backend.
//!
//! Used when no external store is reachable. Data is local to this instance,
//! lost on restart, and never migrated to a live backend after a swap.
//!
//! ## Differences from the live backends
//!
//! - `health_check` always fails so monitoring sees the degraded mode.
//! - There is no native set type: the tenant session index and pattern indices
//!   are JSON lists stored under `active_sessions:<tenant>` and `set:<pattern>`.
//! - Locks are always granted; there is only one process to contend with.
//! - TTLs are honoured lazily: an expired entry reads as absent and is dropped
//!   by that read. Every 256th `set` sweeps the whole map so entries that are
//!   never read again do not accumulate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use time::OffsetDateTime;

use crate::error::CacheError;
use crate::keys;
use crate::metrics;
use crate::store::CacheStore;
use crate::types::{BackendKind, CacheMemoryInfo, CacheValue, UserSession};

struct MemoryEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn expiring(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn persistent(data: Vec<u8>) -> Self {
        Self {
            data,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type EntryMap = HashMap<String, MemoryEntry>;

/// Number of `set` calls between full sweeps of expired entries.
const SWEEP_EVERY: u64 = 256;

/// Process-local cache behind a single reader/writer lock.
pub struct MemoryCache {
    entries: RwLock<EntryMap>,
    default_ttl: Duration,
    writes: AtomicU64,
}

impl MemoryCache {
    /// Create an empty fallback cache.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use lookout_cache::MemoryCache;
    ///
    /// let cache = MemoryCache::new(Duration::from_secs(300));
    /// assert!(cache.is_empty());
    /// ```
    pub fn new(default_ttl: Duration) -> Self {
        tracing::warn!("external cache unavailable; using in-memory fallback");
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            writes: AtomicU64::new(0),
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.entries.write();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        before - map.len()
    }

    fn remove_if_expired(&self, key: &str) {
        let now = Instant::now();
        let mut map = self.entries.write();
        if map.get(key).is_some_and(|entry| entry.is_expired(now)) {
            map.remove(key);
        }
    }

    fn effective_ttl(&self, ttl: Duration) -> Duration {
        if ttl.is_zero() { self.default_ttl } else { ttl }
    }
}

fn live_value<'a>(map: &'a EntryMap, key: &str, now: Instant) -> Option<&'a [u8]> {
    map.get(key)
        .filter(|entry| !entry.is_expired(now))
        .map(|entry| entry.data.as_slice())
}

fn read_members(map: &EntryMap, key: &str) -> Vec<String> {
    live_value(map, key, Instant::now())
        .and_then(|data| serde_json::from_slice(data).ok())
        .unwrap_or_default()
}

fn write_members(map: &mut EntryMap, key: &str, members: &[String]) -> Result<(), CacheError> {
    let data = serde_json::to_vec(members)?;
    map.insert(key.to_string(), MemoryEntry::persistent(data));
    Ok(())
}

fn decode_session(map: &EntryMap, session_id: &str) -> Option<UserSession> {
    live_value(map, &keys::session(session_id), Instant::now())
        .and_then(|data| serde_json::from_slice(data).ok())
}

#[async_trait]
impl CacheStore for MemoryCache {
    fn kind(&self) -> BackendKind {
        BackendKind::Fallback
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let now = Instant::now();
        let expired = {
            let map = self.entries.read();
            match map.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    metrics::record_operation("get", "hit");
                    return Ok(entry.data.clone());
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.remove_if_expired(key);
        }

        tracing::debug!(key = %key, "cache miss (fallback)");
        metrics::record_operation("get", "miss");
        Err(CacheError::not_found(key))
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<(), CacheError> {
        let entry = MemoryEntry::expiring(value.into_bytes(), self.effective_ttl(ttl));
        self.entries.write().insert(key.to_string(), entry);
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            let swept = self.sweep_expired();
            if swept > 0 {
                tracing::debug!(swept, "swept expired fallback entries");
            }
        }
        metrics::record_operation("set", "success");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().remove(key);
        metrics::record_operation("delete", "success");
        Ok(())
    }

    async fn set_session(&self, session: &mut UserSession) -> Result<(), CacheError> {
        session.last_activity = OffsetDateTime::now_utc();
        let data = match serde_json::to_vec(session) {
            Ok(data) => data,
            Err(e) => {
                metrics::record_operation("set_session", "error");
                return Err(e.into());
            }
        };

        let index_key = keys::fallback_active_sessions(&session.tenant_id);
        let mut map = self.entries.write();
        map.insert(
            keys::session(&session.id),
            MemoryEntry::expiring(data, keys::SESSION_TTL),
        );

        let mut members = read_members(&map, &index_key);
        if !members.contains(&session.id) {
            members.push(session.id.clone());
            write_members(&mut map, &index_key, &members)?;
        }
        metrics::record_operation("set_session", "success");
        Ok(())
    }

    async fn invalidate_session(&self, session_id: &str) -> Result<(), CacheError> {
        let mut map = self.entries.write();
        if let Some(session) = decode_session(&map, session_id) {
            let index_key = keys::fallback_active_sessions(&session.tenant_id);
            let mut members = read_members(&map, &index_key);
            let before = members.len();
            members.retain(|id| id != session_id);
            if members.len() != before {
                write_members(&mut map, &index_key, &members)?;
            }
        }
        map.remove(&keys::session(session_id));
        metrics::record_operation("invalidate_session", "success");
        Ok(())
    }

    async fn get_active_sessions(&self, tenant_id: &str) -> Result<Vec<UserSession>, CacheError> {
        let index_key = keys::fallback_active_sessions(tenant_id);
        let mut map = self.entries.write();
        let members = read_members(&map, &index_key);

        let mut sessions = Vec::with_capacity(members.len());
        let mut live_ids = Vec::with_capacity(members.len());
        for id in members.iter() {
            // A session re-saved under another tenant no longer belongs here.
            match decode_session(&map, id) {
                Some(session) if session.tenant_id == tenant_id => {
                    sessions.push(session);
                    live_ids.push(id.clone());
                }
                _ => {}
            }
        }

        if live_ids.len() != members.len() {
            tracing::debug!(
                tenant_id = %tenant_id,
                pruned = members.len() - live_ids.len(),
                "pruned stale session references"
            );
            write_members(&mut map, &index_key, &live_ids)?;
        }
        Ok(sessions)
    }

    async fn acquire_lock(&self, _key: &str, _ttl: Duration) -> Result<bool, CacheError> {
        // Single process: no contention to arbitrate.
        metrics::record_operation("acquire_lock", "success");
        Ok(true)
    }

    async fn release_lock(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    async fn add_to_pattern_index(
        &self,
        pattern: &str,
        cache_key: &str,
    ) -> Result<(), CacheError> {
        let set_key = keys::fallback_set(pattern);
        let mut map = self.entries.write();
        let mut members = read_members(&map, &set_key);
        if members.iter().any(|member| member == cache_key) {
            return Ok(());
        }
        members.push(cache_key.to_string());
        let result = write_members(&mut map, &set_key, &members);
        metrics::record_result("add_pattern_index", &result);
        result
    }

    async fn get_pattern_index_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let map = self.entries.read();
        Ok(read_members(&map, &keys::fallback_set(pattern)))
    }

    async fn delete_pattern_index(&self, pattern: &str) -> Result<(), CacheError> {
        self.entries.write().remove(&keys::fallback_set(pattern));
        metrics::record_operation("delete_pattern_index", "success");
        Ok(())
    }

    async fn delete_multiple(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut map = self.entries.write();
        for key in keys {
            map.remove(key);
        }
        metrics::record_operation("delete_multiple", "success");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        Err(CacheError::Degraded(
            "in-memory fallback cache in use (external cache not connected)".to_string(),
        ))
    }

    async fn get_memory_info(&self) -> Result<CacheMemoryInfo, CacheError> {
        Ok(CacheMemoryInfo {
            memory_fragmentation: 1.0,
            total_keys: self.len() as i64,
            ..CacheMemoryInfo::default()
        })
    }

    async fn adjust_cache_ttl(&self, _pattern: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn cleanup_expired_entries(&self, _pattern: &str) -> Result<u64, CacheError> {
        Ok(0)
    }

    async fn shutdown(&self) {
        tracing::debug!("in-memory fallback cache has no resources to release");
    }
}
