//! Composition root for the Lookout cache layer.
//!
//! Picks a topology from configuration, connects to it, and degrades to the
//! in-process fallback behind a reconnecting supervisor when the store is not
//! reachable at startup. Everything downstream receives an
//! `Arc<dyn CacheStore>` and never learns which backend it got.

pub mod config;
pub mod health;
pub mod observability;

use std::sync::Arc;

use lookout_cache::{
    CacheError, CacheStore, ClusterCache, LiveTarget, MemoryCache, ReconnectingCache,
    SingleNodeCache,
};

use crate::config::CacheConfig;

/// Build the process-wide cache store.
///
/// - One node: single-node backend.
/// - Several nodes: cluster backend. If the first node reports that it is not
///   running in cluster mode, its address is retried as a single node.
///
/// A topology that cannot be reached yields a [`ReconnectingCache`] that serves
/// from memory and keeps dialing that topology in the background.
pub async fn create_cache_store(config: &CacheConfig) -> Arc<dyn CacheStore> {
    if !config.is_cluster() {
        let settings = config.single_node_settings();
        return match SingleNodeCache::connect(&settings).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => degraded(config, LiveTarget::SingleNode(settings), &e),
        };
    }

    let settings = config.cluster_settings();
    match ClusterCache::connect(&settings).await {
        Ok(cache) => Arc::new(cache),
        Err(CacheError::ClusterUnsupported { target }) => {
            tracing::warn!(
                node = %target,
                "Cluster mode not supported by cache, falling back to single-node mode"
            );
            let single = config.single_node_settings();
            match SingleNodeCache::connect(&single).await {
                Ok(cache) => Arc::new(cache),
                Err(e) => degraded(config, LiveTarget::SingleNode(single), &e),
            }
        }
        Err(e) => degraded(config, LiveTarget::Cluster(settings), &e),
    }
}

fn degraded(config: &CacheConfig, target: LiveTarget, error: &CacheError) -> Arc<dyn CacheStore> {
    tracing::warn!(
        error = %error,
        "Cache unreachable at startup, using in-memory fallback"
    );
    let fallback = Arc::new(MemoryCache::new(config.default_ttl()));
    Arc::new(ReconnectingCache::new(
        target,
        fallback,
        config.reconnect_interval(),
    ))
}
