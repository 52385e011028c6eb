//! Degraded-start wrapper that upgrades to a live backend once it is reachable.
//!
//! [`ReconnectingCache`] starts out serving every call from an in-process
//! fallback. One background task retries the intended live topology on a
//! fixed interval and, on the first success, swaps the active backend in a
//! single atomic store. Callers keep their `Arc<dyn CacheStore>` throughout
//! and observe either the old or the new backend on each call.
//!
//! Nothing written to the fallback is carried over to the live backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::CacheError;
use crate::memory::MemoryCache;
use crate::metrics;
use crate::settings::LiveTarget;
use crate::store::CacheStore;
use crate::types::{BackendKind, CacheMemoryInfo, CacheValue, UserSession};

/// Builds a fresh live backend; called once per reconnection attempt.
pub type Connector =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn CacheStore>, CacheError>> + Send + Sync>;

/// A [`CacheStore`] that forwards to whichever backend is active at call time.
pub struct ReconnectingCache {
    active: Arc<ArcSwap<Arc<dyn CacheStore>>>,
    live: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
}

impl ReconnectingCache {
    /// Serve from `fallback` and keep dialing `target` every `interval`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(target: LiveTarget, fallback: Arc<MemoryCache>, interval: Duration) -> Self {
        let description = target.target();
        tracing::warn!(
            endpoint = %description,
            interval_secs = interval.as_secs_f64(),
            "cache starting in degraded mode, will retry live backend in background"
        );
        let target = Arc::new(target);
        Self::with_connector(
            fallback,
            interval,
            Box::new(move || {
                let target = Arc::clone(&target);
                async move { target.connect().await }.boxed()
            }),
        )
    }

    /// Like [`ReconnectingCache::new`] with a caller-supplied connection routine.
    pub fn with_connector(
        fallback: Arc<dyn CacheStore>,
        interval: Duration,
        connector: Connector,
    ) -> Self {
        let active = Arc::new(ArcSwap::from_pointee(fallback));
        let live = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        metrics::set_degraded(true);
        tokio::spawn(reconnect_loop(
            Arc::clone(&active),
            Arc::clone(&live),
            connector,
            interval,
            shutdown_rx,
        ));

        Self {
            active,
            live,
            shutdown_tx,
        }
    }

    /// Stop the reconnection task. Idempotent; the active backend is left open.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            tracing::debug!("cache reconnection task stopped");
        }
    }

    /// Whether the swap to a live backend has happened.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn current(&self) -> Arc<dyn CacheStore> {
        let guard = self.active.load();
        Arc::clone(&**guard)
    }
}

impl Drop for ReconnectingCache {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

async fn reconnect_loop(
    active: Arc<ArcSwap<Arc<dyn CacheStore>>>,
    live: Arc<AtomicBool>,
    connector: Connector,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => return,
        }
        if *shutdown_rx.borrow() {
            return;
        }

        let attempt = tokio::select! {
            result = connector() => result,
            _ = shutdown_rx.changed() => return,
        };

        match attempt {
            Ok(store) => {
                let kind = store.kind();
                active.store(Arc::new(store));
                live.store(true, Ordering::Release);
                metrics::set_degraded(false);
                tracing::info!(
                    backend = %kind,
                    "live cache backend reachable, swapped out fallback"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "cache reconnection attempt failed, staying in degraded mode"
                );
            }
        }
    }
}

#[async_trait]
impl CacheStore for ReconnectingCache {
    fn kind(&self) -> BackendKind {
        self.current().kind()
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, CacheError> {
        self.current().get(key).await
    }

    async fn set(&self, key: &str, value: CacheValue, ttl: Duration) -> Result<(), CacheError> {
        self.current().set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.current().delete(key).await
    }

    async fn set_session(&self, session: &mut UserSession) -> Result<(), CacheError> {
        self.current().set_session(session).await
    }

    async fn get_session(&self, session_id: &str) -> Result<UserSession, CacheError> {
        self.current().get_session(session_id).await
    }

    async fn invalidate_session(&self, session_id: &str) -> Result<(), CacheError> {
        self.current().invalidate_session(session_id).await
    }

    async fn get_active_sessions(&self, tenant_id: &str) -> Result<Vec<UserSession>, CacheError> {
        self.current().get_active_sessions(tenant_id).await
    }

    async fn cache_query_result(
        &self,
        query_hash: &str,
        result: CacheValue,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.current()
            .cache_query_result(query_hash, result, ttl)
            .await
    }

    async fn get_cached_query_result(&self, query_hash: &str) -> Result<Vec<u8>, CacheError> {
        self.current().get_cached_query_result(query_hash).await
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        self.current().acquire_lock(key, ttl).await
    }

    async fn release_lock(&self, key: &str) -> Result<(), CacheError> {
        self.current().release_lock(key).await
    }

    async fn add_to_pattern_index(
        &self,
        pattern: &str,
        cache_key: &str,
    ) -> Result<(), CacheError> {
        self.current().add_to_pattern_index(pattern, cache_key).await
    }

    async fn get_pattern_index_keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.current().get_pattern_index_keys(pattern).await
    }

    async fn delete_pattern_index(&self, pattern: &str) -> Result<(), CacheError> {
        self.current().delete_pattern_index(pattern).await
    }

    async fn delete_multiple(&self, keys: &[String]) -> Result<(), CacheError> {
        self.current().delete_multiple(keys).await
    }

    async fn health_check(&self) -> Result<(), CacheError> {
        self.current().health_check().await
    }

    async fn get_memory_info(&self) -> Result<CacheMemoryInfo, CacheError> {
        self.current().get_memory_info().await
    }

    async fn adjust_cache_ttl(&self, pattern: &str, ttl: Duration) -> Result<(), CacheError> {
        self.current().adjust_cache_ttl(pattern, ttl).await
    }

    async fn cleanup_expired_entries(&self, pattern: &str) -> Result<u64, CacheError> {
        self.current().cleanup_expired_entries(pattern).await
    }

    /// Stops the reconnection task only; a swapped-in live backend keeps its pool.
    async fn shutdown(&self) {
        self.stop();
    }
}
