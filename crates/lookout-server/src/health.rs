//! Periodic cache health reporting.
//!
//! The fallback backend fails every health check by design, so this is where
//! degraded mode becomes visible: a warning on each transition into it and the
//! `cache_degraded` gauge while it lasts.

use std::sync::Arc;
use std::time::Duration;

use lookout_cache::{CacheStore, metrics};
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

/// Result of one health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHealth {
    Healthy,
    Degraded,
}

pub struct CacheHealthReporter {
    store: Arc<dyn CacheStore>,
    interval: Duration,
    last: Option<CacheHealth>,
}

impl CacheHealthReporter {
    pub fn new(store: Arc<dyn CacheStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            last: None,
        }
    }

    /// Start reporting in a background task.
    ///
    /// Returns a shutdown sender that can be used to stop the reporter.
    pub fn start(mut self) -> watch::Sender<bool> {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "Cache health reporter started"
            );

            let mut ticker = interval(self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.check().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Cache health reporter shutting down");
                            break;
                        }
                    }
                }
            }
        });

        shutdown_tx
    }

    /// Probe the store once, logging only when the state changes.
    pub async fn check(&mut self) -> CacheHealth {
        let (health, reason) = match self.store.health_check().await {
            Ok(()) => (CacheHealth::Healthy, None),
            Err(e) => (CacheHealth::Degraded, Some(e.to_string())),
        };

        if self.last != Some(health) {
            let backend = self.store.kind();
            match (health, reason) {
                (CacheHealth::Healthy, _) => {
                    info!(backend = %backend, "Cache healthy");
                }
                (CacheHealth::Degraded, reason) => {
                    warn!(
                        backend = %backend,
                        reason = reason.as_deref().unwrap_or_default(),
                        "Cache degraded"
                    );
                }
            }
            metrics::set_degraded(health == CacheHealth::Degraded);
            self.last = Some(health);
        }

        health
    }
}
