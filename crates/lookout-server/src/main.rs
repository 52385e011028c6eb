use std::env;

use lookout_server::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use lookout_server::health::CacheHealthReporter;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From LOOKOUT_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (lookout.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (LOOKOUT_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    load_dotenv();
    lookout_server::observability::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(config_path.as_str())) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    if let Err(e) = lookout_server::observability::apply_logging_level(&cfg.logging.level) {
        tracing::warn!(error = %e, "keeping bootstrap log level");
    }

    let store = lookout_server::create_cache_store(&cfg.cache).await;
    tracing::info!(
        backend = %store.kind(),
        nodes = cfg.cache.nodes.len(),
        "Cache layer ready"
    );

    let health_shutdown =
        CacheHealthReporter::new(store.clone(), cfg.cache.health_interval()).start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");

    health_shutdown.send_replace(true);
    store.shutdown().await;
}

/// Read `.env` into the process environment. A missing file is fine.
fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => eprintln!("ignoring unreadable .env file: {e}"),
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: LOOKOUT_CONFIG
/// 3. Default: lookout.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("LOOKOUT_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}
