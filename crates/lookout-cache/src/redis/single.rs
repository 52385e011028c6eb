//! Single-node topology.

use async_trait::async_trait;

use super::{PoolHandle, RedisCache, pool_config, pool_error};
use crate::error::CacheError;
use crate::settings::SingleNodeSettings;
use crate::types::BackendKind;

#[async_trait]
impl PoolHandle for deadpool_redis::Pool {
    type Connection = deadpool_redis::Connection;

    const KIND: BackendKind = BackendKind::SingleNode;

    async fn connection(&self) -> Result<Self::Connection, CacheError> {
        self.get().await.map_err(pool_error)
    }

    fn close_pool(&self) {
        self.close();
    }
}

impl RedisCache<deadpool_redis::Pool> {
    /// Connect to one endpoint and verify it answers within the connect timeout.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Connection` when the endpoint cannot be reached.
    pub async fn connect(settings: &SingleNodeSettings) -> Result<Self, CacheError> {
        let url = settings.url()?;
        let mut config = deadpool_redis::Config::from_url(url);
        config.pool = Some(pool_config(&settings.options));

        let pool = config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| CacheError::connection(&settings.addr, e))?;

        let cache = Self::new(pool, settings.addr.clone(), &settings.options);
        if let Err(e) = cache.verify(settings.options.connect_timeout).await {
            cache.pool.close();
            return Err(CacheError::connection(&settings.addr, e));
        }

        tracing::info!(addr = %settings.addr, db = settings.db, "connected to single-node cache");
        Ok(cache)
    }
}
