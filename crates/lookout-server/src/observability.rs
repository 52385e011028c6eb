//! Structured log output.
//!
//! A bootstrap subscriber is installed before configuration is read. Its
//! filter sits behind a reload layer so the configured level can replace it
//! later. `RUST_LOG`, when set, wins over both.

use std::sync::OnceLock;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn rust_log_is_set() -> bool {
    std::env::var_os(EnvFilter::DEFAULT_ENV).is_some()
}

/// Filter for `level`, or the `RUST_LOG` directives when those parse.
fn filter_for(level: LevelFilter) -> EnvFilter {
    let configured = EnvFilter::default().add_directive(level.into());
    if rust_log_is_set() {
        EnvFilter::try_from_default_env().unwrap_or(configured)
    } else {
        configured
    }
}

/// Parse a configured level name (`trace` through `error`, or `off`).
pub fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level
        .trim()
        .parse()
        .map_err(|_| format!("unknown log level `{level}`"))
}

/// Install the global subscriber at `info`. Later calls are no-ops.
pub fn init_tracing() {
    let (filter, handle) = reload::Layer::new(filter_for(LevelFilter::INFO));
    if FILTER_HANDLE.set(handle).is_err() {
        return;
    }
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

/// Switch the running subscriber to the configured `level`.
///
/// A set `RUST_LOG` stays in charge and the call only validates `level`.
///
/// # Errors
///
/// Returns a message when `level` is not a log level or the subscriber is gone.
pub fn apply_logging_level(level: &str) -> Result<(), String> {
    let level = parse_level(level)?;
    if rust_log_is_set() {
        return Ok(());
    }
    match FILTER_HANDLE.get() {
        Some(handle) => handle.reload(filter_for(level)).map_err(|e| e.to_string()),
        None => Ok(()),
    }
}
