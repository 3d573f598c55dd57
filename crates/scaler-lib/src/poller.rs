//! Periodic polling primitive
//!
//! Runs a source's fetch on a fixed interval and publishes each result to
//! the merge loop over a bounded channel. A failed fetch withholds that
//! tick's publication, leaving the merge loop on its previous value; the
//! shutdown signal is honored at every suspension point.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{info, warn};

use crate::health::HealthRegistry;
use crate::observability::ScalerMetrics;

pub use async_trait::async_trait;

/// A signal source the poller can drive
#[async_trait]
pub trait Source: Send + Sync {
    type Item: Send + 'static;

    /// Compute one complete snapshot of the signal
    async fn fetch(&self) -> anyhow::Result<Self::Item>;
}

/// Configuration for a periodic poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Fixed fetch interval (default: 10 seconds)
    pub interval: Duration,
    /// Channel capacity toward the merge loop
    ///
    /// If the merge loop falls behind, the poller blocks on the hand-off
    /// rather than dropping snapshots.
    pub buffer: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            buffer: 1,
        }
    }
}

/// Periodic poller publishing one source's snapshots
pub struct Poller<S: Source> {
    name: &'static str,
    source: Arc<S>,
    config: PollerConfig,
    tx: mpsc::Sender<S::Item>,
    metrics: ScalerMetrics,
    health: HealthRegistry,
}

impl<S: Source + 'static> Poller<S> {
    /// Create a poller and the receiving end of its snapshot channel
    pub fn new(
        name: &'static str,
        source: Arc<S>,
        config: PollerConfig,
        metrics: ScalerMetrics,
        health: HealthRegistry,
    ) -> (Self, mpsc::Receiver<S::Item>) {
        let (tx, rx) = mpsc::channel(config.buffer);
        let poller = Self {
            name,
            source,
            config,
            tx,
            metrics,
            health,
        };
        (poller, rx)
    }

    /// Run until shutdown or until the merge loop drops the receiver
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            source = self.name,
            interval_secs = self.config.interval.as_secs(),
            "Starting poller"
        );

        let mut ticker = interval(self.config.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.source.fetch().await {
                        Ok(item) => {
                            self.metrics.record_poll_cycle(self.name);
                            self.health.set_healthy(self.name).await;

                            // Blocking hand-off; bail out if the merge loop
                            // is gone or shutdown arrives mid-send
                            tokio::select! {
                                sent = self.tx.send(item) => {
                                    if sent.is_err() {
                                        info!(source = self.name, "Snapshot channel closed; stopping poller");
                                        break;
                                    }
                                }
                                _ = shutdown.recv() => {
                                    info!(source = self.name, "Shutting down poller");
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            // Withhold this tick; the merge loop keeps
                            // operating on the previous snapshot
                            warn!(source = self.name, error = %e, "Poll failed; publication withheld");
                            self.metrics.record_poll_failure(self.name);
                            self.health.set_degraded(self.name, e.to_string()).await;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!(source = self.name, "Shutting down poller");
                    break;
                }
            }
        }
    }
}
