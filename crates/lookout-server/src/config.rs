use std::time::Duration;

use lookout_cache::{ClusterSettings, ConnectOptions, SingleNodeSettings};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Cache validations
        if self.cache.nodes.is_empty() {
            return Err("cache.nodes must list at least one node".into());
        }
        if self.cache.nodes.iter().any(|n| n.trim().is_empty()) {
            return Err("cache.nodes must not contain empty entries".into());
        }
        if self.cache.ttl_secs == 0 {
            return Err("cache.ttl_secs must be > 0".into());
        }
        if self.cache.reconnect_interval_secs == 0 {
            return Err("cache.reconnect_interval_secs must be > 0".into());
        }
        if self.cache.health_interval_secs == 0 {
            return Err("cache.health_interval_secs must be > 0".into());
        }
        if self.cache.pool_size == 0 {
            return Err("cache.pool_size must be > 0".into());
        }
        if self.cache.connect_timeout_ms == 0 || self.cache.op_timeout_ms == 0 {
            return Err("cache timeouts must be > 0".into());
        }
        if self.cache.db < 0 {
            return Err("cache.db must be >= 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// Cache topology and connection settings.
///
/// One node selects the single-node backend, several nodes a cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_nodes")]
    pub nodes: Vec<String>,
    /// Default TTL for entries written with a zero TTL
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Logical database (single-node only)
    #[serde(default)]
    pub db: i64,
    #[serde(default)]
    pub password: Option<String>,
    /// Interval between reconnection attempts while degraded
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,
    #[serde(default = "default_cache_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Bound on each individual cache command
    #[serde(default = "default_cache_timeout_ms")]
    pub op_timeout_ms: u64,
    #[serde(default = "default_cache_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
}

fn default_cache_nodes() -> Vec<String> {
    vec!["localhost:6379".to_string()]
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_reconnect_interval_secs() -> u64 {
    5
}

fn default_cache_timeout_ms() -> u64 {
    5000
}

fn default_cache_pool_size() -> usize {
    10
}

fn default_health_interval_secs() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            nodes: default_cache_nodes(),
            ttl_secs: default_cache_ttl_secs(),
            db: 0,
            password: None,
            reconnect_interval_secs: default_reconnect_interval_secs(),
            connect_timeout_ms: default_cache_timeout_ms(),
            op_timeout_ms: default_cache_timeout_ms(),
            pool_size: default_cache_pool_size(),
            health_interval_secs: default_health_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn is_cluster(&self) -> bool {
        self.nodes.len() > 1
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            default_ttl: self.default_ttl(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            op_timeout: Duration::from_millis(self.op_timeout_ms),
            pool_size: self.pool_size,
        }
    }

    /// Settings for the first node as a standalone endpoint.
    pub fn single_node_settings(&self) -> SingleNodeSettings {
        SingleNodeSettings {
            addr: self.nodes.first().cloned().unwrap_or_default(),
            db: self.db,
            password: self.password.clone(),
            options: self.connect_options(),
        }
    }

    pub fn cluster_settings(&self) -> ClusterSettings {
        ClusterSettings {
            nodes: self.nodes.clone(),
            password: self.password.clone(),
            options: self.connect_options(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "lookout.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., LOOKOUT__CACHE__TTL_SECS=600
        // and LOOKOUT__CACHE__NODES=10.0.0.1:6379,10.0.0.2:6379
        builder = builder.add_source(
            Environment::with_prefix("LOOKOUT")
                .try_parsing(true)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("cache.nodes"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }
}
