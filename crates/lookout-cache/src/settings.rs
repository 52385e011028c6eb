//! Connection parameters for the live backends.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::CacheError;
use crate::redis::{ClusterCache, SingleNodeCache};
use crate::store::CacheStore;

/// Options shared by both live topologies.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// TTL applied when a caller passes `Duration::ZERO`.
    pub default_ttl: Duration,
    /// Bound on the initial liveness probe.
    pub connect_timeout: Duration,
    /// Bound on every individual command.
    pub op_timeout: Duration,
    pub pool_size: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(5),
            op_timeout: Duration::from_secs(5),
            pool_size: 10,
        }
    }
}

/// One store endpoint, optionally with a logical database and credential.
#[derive(Debug, Clone)]
pub struct SingleNodeSettings {
    /// `host:port` or a full `redis://` URL.
    pub addr: String,
    pub db: i64,
    pub password: Option<String>,
    pub options: ConnectOptions,
}

impl SingleNodeSettings {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            db: 0,
            password: None,
            options: ConnectOptions::default(),
        }
    }

    /// Connection URL carrying the credential and database selector.
    pub fn url(&self) -> Result<String, CacheError> {
        let mut url = node_url(&self.addr)?;
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password)).map_err(|()| {
                CacheError::connection(&self.addr, "address cannot carry a password")
            })?;
        }
        url.set_path(&format!("/{}", self.db));
        Ok(url.to_string())
    }
}

/// A sharded multi-node deployment.
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    /// Seed nodes, `host:port` or full `redis://` URLs.
    pub nodes: Vec<String>,
    pub password: Option<String>,
    pub options: ConnectOptions,
}

impl ClusterSettings {
    pub fn new(nodes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            password: None,
            options: ConnectOptions::default(),
        }
    }

    pub fn urls(&self) -> Result<Vec<String>, CacheError> {
        self.nodes
            .iter()
            .map(|node| {
                let mut url = node_url(node)?;
                if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
                    url.set_password(Some(password)).map_err(|()| {
                        CacheError::connection(node, "address cannot carry a password")
                    })?;
                }
                Ok(url.to_string())
            })
            .collect()
    }

    /// Human-readable node list for logs and errors.
    pub fn target(&self) -> String {
        self.nodes.join(",")
    }
}

/// The live topology a supervisor keeps trying to reach.
#[derive(Debug, Clone)]
pub enum LiveTarget {
    SingleNode(SingleNodeSettings),
    Cluster(ClusterSettings),
}

impl LiveTarget {
    /// Dial the target using the same path as a direct construction.
    pub async fn connect(&self) -> Result<Arc<dyn CacheStore>, CacheError> {
        match self {
            LiveTarget::SingleNode(settings) => {
                Ok(Arc::new(SingleNodeCache::connect(settings).await?))
            }
            LiveTarget::Cluster(settings) => Ok(Arc::new(ClusterCache::connect(settings).await?)),
        }
    }

    pub fn target(&self) -> String {
        match self {
            LiveTarget::SingleNode(settings) => settings.addr.clone(),
            LiveTarget::Cluster(settings) => settings.target(),
        }
    }
}

fn node_url(addr: &str) -> Result<Url, CacheError> {
    let raw = if addr.contains("://") {
        addr.to_string()
    } else {
        format!("redis://{addr}")
    };
    Url::parse(&raw).map_err(|e| CacheError::connection(addr, e))
}
