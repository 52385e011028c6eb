//! Live backends on top of Redis/Valkey.
//!
//! Both topologies share one implementation, [`RedisCache`], parameterised by
//! the deadpool pool that hands out connections:
//!
//! - [`SingleNodeCache`]: one endpoint, optional database selector and credential
//! - [`ClusterCache`]: a sharded deployment reached through its seed nodes
//!
//! Concurrency is delegated to the pool. Every command is bounded by the
//! configured operation timeout and surfaces [`CacheError::Timeout`] when it
//! expires.

mod cluster;
mod info;
mod single;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionLike;
use redis::{AsyncCommands, RedisResult};
use time::OffsetDateTime;

use crate::error::CacheError;
use crate::keys;
use crate::metrics;
use crate::settings::ConnectOptions;
use crate::store::CacheStore;
use crate::types::{BackendKind, CacheMemoryInfo, CacheValue, UserSession};

pub use info::parse_memory_info;

/// A deadpool pool that hands out connections for one topology.
#[async_trait]
pub trait PoolHandle: Send + Sync + 'static {
    type Connection: ConnectionLike + Send;

    const KIND: BackendKind;

    async fn connection(&self) -> Result<Self::Connection, CacheError>;

    /// Close the pool and drop idle connections.
    fn close_pool(&self);
}

/// Single-node live backend.
pub type SingleNodeCache = RedisCache<deadpool_redis::Pool>;

/// Cluster live backend.
pub type ClusterCache = RedisCache<deadpool_redis::cluster::Pool>;

/// Cache contract implemented against a Redis-compatible store.
pub struct RedisCache<P: PoolHandle> {
    pool: P,
    target: String,
    default_ttl: Duration,
    op_timeout: Duration,
}

impl<P: PoolHandle> RedisCache<P> {
    fn new(pool: P, target: String, options: &ConnectOptions) -> Self {
        Self {
            pool,
            target,
            default_ttl: options.default_ttl,
            op_timeout: options.op_timeout,
        }
    }

    /// The node address or node list this backend was built for.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Liveness probe bounded by `connect_timeout`.
    async fn verify(&self, connect_timeout: Duration) -> Result<(), CacheError> {
        match tokio::time::timeout(connect_timeout, self.ping()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(connect_timeout)),
        }
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: redis::Value = self
            .bounded(redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn connection(&self) -> Result<P::Connection, CacheError> {
        match tokio::time::timeout(self.op_timeout, self.pool.connection()).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }

    async fn bounded<T, F>(&self, command: F) -> Result<T, CacheError>
    where
        F: Future<Output = RedisResult<T>> + Send,
        T: Send,
    {
        match tokio::time::timeout(self.op_timeout, command).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }

    fn effective_ttl(&self, ttl: Duration) -> Duration {
        if ttl.is_zero() { self.default_ttl } else { ttl }
    }

    async fn keys_matching(
        &self,
        conn: &mut P::Connection,
        pattern: &str,
    ) -> Result<Vec<String>, CacheError> {
        self.bounded(conn.keys(pattern)).await
    }
}

/// Milliseconds for `PX`-style arguments; never zero.
fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

pub(crate) fn pool_error(e: deadpool_redis::PoolError) -> CacheError {
    match e {
        deadpool_redis::PoolError::Backend(e) => CacheError::Backend(e),
        other => CacheError::Pool(other.to_string()),
    }
}

pub(crate) fn pool_config(options: &ConnectOptions) -> deadpool_redis::PoolConfig {
    let mut config = deadpool_redis::PoolConfig::new(options.pool_size);
    config.timeouts.wait = Some(options.connect_timeout);
    config.timeouts.create = Some(options.connect_timeout);
    config.timeouts.recycle = Some(options.connect_timeout);
    config
}

#[async_trait]
impl<P: PoolHandle> CacheStore for RedisCache<P> {
    fn kind(&self) -> BackendKind {
        P::KIND
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        let mut conn = self.connection().await?;
        let result: Result<Option<Vec<u8>>, CacheError> = self.bounded(conn.get(key)).await;
        match result {
            Ok(Some(data)) => {
                metrics::record_operation("get", "hit");
                Ok(data)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "cache miss");
                metrics::record_operation("get", "miss");
                Err(CacheError::not_found(key))
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache GET error");
                metrics::record_operation("get", "error");
                Err(e)
            }
        }
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<(), CacheError> {
        let ttl = self.effective_ttl(ttl);
        let mut conn = self.connection().await?;
        let result: Result<(), CacheError> = self
            .bounded(conn.pset_ex(key, value.as_bytes(), millis(ttl)))
            .await;
        metrics::record_result("set", &result);
        result
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let result: Result<(), CacheError> = self.bounded(conn.del(key)).await;
        metrics::record_result("delete", &result);
        result
    }

    async fn set_session(&self, session: &mut UserSession) -> Result<(), CacheError> {
        session.last_activity = OffsetDateTime::now_utc();
        let value = CacheValue::json(&*session)?;

        if let Err(e) = self
            .set(&keys::session(&session.id), value, keys::SESSION_TTL)
            .await
        {
            metrics::record_operation("set_session", "error");
            return Err(e);
        }

        // Not atomic with the write above: on failure the session still
        // resolves by ID but is missing from the tenant listing.
        let mut conn = self.connection().await?;
        let result: Result<(), CacheError> = self
            .bounded(conn.sadd(keys::tenant_sessions(&session.tenant_id), &session.id))
            .await;
        metrics::record_result("set_session", &result);
        result
    }

    async fn invalidate_session(&self, session_id: &str) -> Result<(), CacheError> {
        // Index removal is best-effort; the session key is deleted regardless.
        if let Ok(session) = self.get_session(session_id).await {
            let removed = match self.connection().await {
                Ok(mut conn) => {
                    self.bounded::<(), _>(
                        conn.srem(keys::tenant_sessions(&session.tenant_id), session_id),
                    )
                    .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = removed {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "failed to drop session from tenant index"
                );
            }
        }

        let result = self.delete(&keys::session(session_id)).await;
        metrics::record_result("invalidate_session", &result);
        result
    }

    async fn get_active_sessions(&self, tenant_id: &str) -> Result<Vec<UserSession>, CacheError> {
        let tenant_key = keys::tenant_sessions(tenant_id);
        let session_ids: Vec<String> = {
            let mut conn = self.connection().await?;
            self.bounded(conn.smembers(&tenant_key)).await?
        };

        let mut sessions = Vec::with_capacity(session_ids.len());
        for session_id in session_ids {
            match self.get_session(&session_id).await {
                Ok(session) if session.tenant_id == tenant_id => sessions.push(session),
                // Moved to another tenant, expired, or unreadable: drop the reference.
                Ok(_) | Err(CacheError::NotFound(_) | CacheError::Serialization(_)) => {
                    let mut conn = self.connection().await?;
                    let pruned: Result<(), CacheError> =
                        self.bounded(conn.srem(&tenant_key, &session_id)).await;
                    if let Err(e) = pruned {
                        tracing::warn!(
                            tenant_id = %tenant_id,
                            session_id = %session_id,
                            error = %e,
                            "failed to prune stale session reference"
                        );
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(sessions)
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let ttl = self.effective_ttl(ttl);
        let mut conn = self.connection().await?;
        let reply: Result<Option<String>, CacheError> = self
            .bounded(
                redis::cmd("SET")
                    .arg(keys::lock(key))
                    .arg("locked")
                    .arg("NX")
                    .arg("PX")
                    .arg(millis(ttl))
                    .query_async(&mut conn),
            )
            .await;

        match reply {
            Ok(Some(_)) => {
                metrics::record_operation("acquire_lock", "success");
                Ok(true)
            }
            Ok(None) => {
                metrics::record_operation("acquire_lock", "conflict");
                Ok(false)
            }
            Err(e) => {
                metrics::record_operation("acquire_lock", "error");
                Err(e)
            }
        }
    }

    async fn release_lock(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let result: Result<(), CacheError> = self.bounded(conn.del(keys::lock(key))).await;
        metrics::record_result("release_lock", &result);
        result
    }

    async fn add_to_pattern_index(
        &self,
        pattern: &str,
        cache_key: &str,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let result: Result<(), CacheError> = self.bounded(conn.sadd(pattern, cache_key)).await;
        metrics::record_result("add_pattern_index", &result);
        result
    }

    async fn get_pattern_index_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection().await?;
        let result: Result<Vec<String>, CacheError> = self.bounded(conn.smembers(pattern)).await;
        metrics::record_result("get_pattern_index", &result);
        result
    }

    async fn delete_pattern_index(&self, pattern: &str) -> Result<(), CacheError> {
        self.delete(pattern).await
    }

    async fn delete_multiple(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }

        // One DEL per key: keys may live in different cluster slots, and one
        // failure must not abort the batch.
        let mut conn = self.connection().await?;
        let mut failed = 0usize;
        for key in keys {
            let result: Result<(), CacheError> = self.bounded(conn.del(key)).await;
            if let Err(e) = result {
                failed += 1;
                tracing::warn!(key = %key, error = %e, "failed to delete key, skipping");
            }
        }

        let status = if failed == 0 { "success" } else { "error" };
        metrics::record_operation("delete_multiple", status);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        self.ping().await
    }

    async fn get_memory_info(&self) -> Result<CacheMemoryInfo, CacheError> {
        let mut conn = self.connection().await?;
        let reply: redis::Value = self
            .bounded(redis::cmd("INFO").query_async(&mut conn))
            .await?;
        Ok(parse_memory_info(&info::info_text(&reply)))
    }

    async fn adjust_cache_ttl(&self, pattern: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let keys = self.keys_matching(&mut conn, pattern).await?;

        let mut updated = 0usize;
        for key in &keys {
            let result: Result<i64, CacheError> = self
                .bounded(
                    redis::cmd("PEXPIRE")
                        .arg(key)
                        .arg(millis(ttl))
                        .query_async(&mut conn),
                )
                .await;
            match result {
                Ok(_) => updated += 1,
                Err(e) => tracing::warn!(key = %key, error = %e, "failed to update TTL for key"),
            }
        }

        tracing::info!(
            pattern = %pattern,
            new_ttl_ms = millis(ttl),
            keys_updated = updated,
            "adjusted cache TTL"
        );
        Ok(())
    }

    async fn cleanup_expired_entries(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        let keys = self.keys_matching(&mut conn, pattern).await?;

        let mut deleted = 0u64;
        for key in &keys {
            let remaining: Result<i64, CacheError> = self
                .bounded(redis::cmd("PTTL").arg(key).query_async(&mut conn))
                .await;
            // -1: no expiry. -2: Redis already expired it, which is the common case
            // for anything past its deadline. Only keys at exactly 0 are removed.
            if !matches!(remaining, Ok(0)) {
                continue;
            }
            let result: Result<(), CacheError> = self.bounded(conn.del(key)).await;
            if result.is_ok() {
                deleted += 1;
            }
        }

        tracing::info!(pattern = %pattern, deleted, "cleaned up expired entries");
        Ok(deleted)
    }

    async fn shutdown(&self) {
        let kind = P::KIND;
        tracing::info!(backend = %kind, endpoint = %self.target, "closing cache connection pool");
        self.pool.close_pool();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use redis::{Arg, Cmd, Pipeline, RedisFuture, Value};

    #[derive(Clone, Copy)]
    enum GetReply {
        Stall,
        Session,
    }

    /// In-process connection that answers from a fixed script and records
    /// the command names it receives.
    #[derive(Clone)]
    struct ScriptedConnection {
        get_reply: GetReply,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl ConnectionLike for ScriptedConnection {
        fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
            let name = match cmd.args_iter().next() {
                Some(Arg::Simple(bytes)) => String::from_utf8_lossy(bytes).to_ascii_uppercase(),
                _ => String::new(),
            };
            self.seen.lock().push(name.clone());
            let get_reply = self.get_reply;
            Box::pin(async move {
                match (name.as_str(), get_reply) {
                    ("GET", GetReply::Stall) => std::future::pending().await,
                    ("GET", GetReply::Session) => {
                        let session = UserSession::new("tok", "acme", "alice");
                        Ok(Value::BulkString(
                            serde_json::to_vec(&session).expect("encode session"),
                        ))
                    }
                    ("DEL" | "SREM", _) => Ok(Value::Int(1)),
                    _ => Ok(Value::Okay),
                }
            })
        }

        fn req_packed_commands<'a>(
            &'a mut self,
            _cmd: &'a Pipeline,
            _offset: usize,
            _count: usize,
        ) -> RedisFuture<'a, Vec<Value>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn get_db(&self) -> i64 {
            0
        }
    }

    struct ScriptedPool {
        conn: ScriptedConnection,
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl PoolHandle for ScriptedPool {
        type Connection = ScriptedConnection;

        const KIND: BackendKind = BackendKind::SingleNode;

        async fn connection(&self) -> Result<ScriptedConnection, CacheError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_call == Some(call) {
                return Err(CacheError::Pool("no connection available".into()));
            }
            Ok(self.conn.clone())
        }

        fn close_pool(&self) {}
    }

    fn scripted(
        get_reply: GetReply,
        fail_on_call: Option<usize>,
    ) -> (RedisCache<ScriptedPool>, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pool = ScriptedPool {
            conn: ScriptedConnection {
                get_reply,
                seen: Arc::clone(&seen),
            },
            calls: AtomicUsize::new(0),
            fail_on_call,
        };
        let options = ConnectOptions {
            op_timeout: Duration::from_millis(100),
            ..ConnectOptions::default()
        };
        (RedisCache::new(pool, "scripted:6379".into(), &options), seen)
    }

    #[tokio::test]
    async fn test_stalled_command_times_out() {
        let (cache, seen) = scripted(GetReply::Stall, None);

        let started = std::time::Instant::now();
        let err = cache.get("slow").await.unwrap_err();

        assert!(
            matches!(err, CacheError::Timeout(d) if d == Duration::from_millis(100)),
            "unexpected error: {err}"
        );
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(*seen.lock(), vec!["GET"]);
    }

    #[tokio::test]
    async fn test_invalidate_session_deletes_when_index_update_fails() {
        // Call 1 reads the session; call 2 is the tenant index update.
        let (cache, seen) = scripted(GetReply::Session, Some(2));

        cache.invalidate_session("tok").await.unwrap();

        assert_eq!(*seen.lock(), vec!["GET", "DEL"]);
    }

    #[tokio::test]
    async fn test_invalidate_session_updates_index() {
        let (cache, seen) = scripted(GetReply::Session, None);

        cache.invalidate_session("tok").await.unwrap();

        assert_eq!(*seen.lock(), vec!["GET", "SREM", "DEL"]);
    }

    #[test]
    fn test_millis_never_zero() {
        assert_eq!(millis(Duration::ZERO), 1);
        assert_eq!(millis(Duration::from_micros(10)), 1);
        assert_eq!(millis(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn test_pool_config() {
        let options = ConnectOptions {
            pool_size: 4,
            connect_timeout: Duration::from_millis(250),
            ..ConnectOptions::default()
        };
        let config = pool_config(&options);
        assert_eq!(config.max_size, 4);
        assert_eq!(config.timeouts.wait, Some(Duration::from_millis(250)));
    }
}
