//! Cluster topology.

use std::time::Duration;

use async_trait::async_trait;

use super::info::extract_info_value;
use super::{PoolHandle, RedisCache, pool_config, pool_error};
use crate::error::CacheError;
use crate::settings::ClusterSettings;
use crate::types::BackendKind;

#[async_trait]
impl PoolHandle for deadpool_redis::cluster::Pool {
    type Connection = deadpool_redis::cluster::Connection;

    const KIND: BackendKind = BackendKind::Cluster;

    async fn connection(&self) -> Result<Self::Connection, CacheError> {
        self.get().await.map_err(pool_error)
    }

    fn close_pool(&self) {
        self.close();
    }
}

impl RedisCache<deadpool_redis::cluster::Pool> {
    /// Connect to a cluster through its seed nodes.
    ///
    /// # Errors
    ///
    /// - `CacheError::ClusterUnsupported` when the first node is a standalone
    ///   instance, so the caller can retry in single-node mode
    /// - `CacheError::Connection` for every other failure
    pub async fn connect(settings: &ClusterSettings) -> Result<Self, CacheError> {
        let target = settings.target();
        let urls = settings.urls()?;
        let Some(first_url) = urls.first().cloned() else {
            return Err(CacheError::connection(target, "no cluster nodes configured"));
        };

        let mut config = deadpool_redis::cluster::Config::from_urls(urls);
        config.pool = Some(pool_config(&settings.options));

        let pool = config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| CacheError::connection(&target, e))?;

        let cache = Self::new(pool, target.clone(), &settings.options);
        if let Err(e) = cache.verify(settings.options.connect_timeout).await {
            cache.pool.close();
            return Err(classify_failure(settings, &first_url, e).await);
        }

        tracing::info!(nodes = settings.nodes.len(), "connected to cluster cache");
        Ok(cache)
    }
}

/// Tell "not a cluster deployment" apart from "unreachable".
///
/// The first node is asked for `INFO cluster`; `cluster_enabled:0` is the
/// authoritative signal. Only when that probe cannot run do we fall back to
/// matching the text of the original error.
async fn classify_failure(
    settings: &ClusterSettings,
    first_url: &str,
    err: CacheError,
) -> CacheError {
    let first_node = settings.nodes.first().cloned().unwrap_or_default();

    match probe_cluster_enabled(first_url, settings.options.connect_timeout).await {
        Ok(false) => CacheError::ClusterUnsupported { target: first_node },
        Ok(true) => CacheError::connection(settings.target(), err),
        Err(probe_err) => {
            tracing::debug!(error = %probe_err, "cluster capability probe failed");
            if mentions_cluster_disabled(&err) {
                CacheError::ClusterUnsupported { target: first_node }
            } else {
                CacheError::connection(settings.target(), err)
            }
        }
    }
}

async fn probe_cluster_enabled(url: &str, timeout: Duration) -> Result<bool, CacheError> {
    let client = redis::Client::open(url)?;
    let probe = async {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let info: String = redis::cmd("INFO").arg("cluster").query_async(&mut conn).await?;
        Ok::<_, redis::RedisError>(info)
    };

    let info = match tokio::time::timeout(timeout, probe).await {
        Ok(result) => result?,
        Err(_) => return Err(CacheError::Timeout(timeout)),
    };
    Ok(extract_info_value(&info, "cluster_enabled").is_none_or(|value| value != "0"))
}

fn mentions_cluster_disabled(err: &CacheError) -> bool {
    err.to_string()
        .to_ascii_lowercase()
        .contains("cluster support disabled")
}
