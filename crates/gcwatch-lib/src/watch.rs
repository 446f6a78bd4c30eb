//! Periodic detection loop
//!
//! Runs `detect()` on a fixed interval, logs the verdict and mirrors it on
//! the health registry until a shutdown signal arrives.

use crate::health::{components, HealthRegistry};
use crate::monitor::OverflowMonitor;
use crate::observability::StructuredLogger;
use crate::source::StreamEventSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the watch loop
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Time between detections (default: 10 seconds)
    pub interval: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

/// Loop that periodically classifies the monitor's readings
pub struct WatchLoop {
    monitor: Arc<OverflowMonitor>,
    health: HealthRegistry,
    logger: StructuredLogger,
    config: WatchConfig,
    stream: Option<Arc<StreamEventSource>>,
}

impl WatchLoop {
    pub fn new(
        monitor: Arc<OverflowMonitor>,
        health: HealthRegistry,
        logger: StructuredLogger,
        config: WatchConfig,
    ) -> Self {
        Self {
            monitor,
            health,
            logger,
            config,
            stream: None,
        }
    }

    /// Also report the event source unhealthy once `stream` is exhausted
    pub fn with_stream(mut self, stream: Arc<StreamEventSource>) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Run until `shutdown` fires (or its sender is dropped)
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            "Starting overflow watch loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut detections = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                    detections += 1;
                }
                _ = shutdown.recv() => {
                    info!(detections = detections, "Shutting down overflow watch loop");
                    break;
                }
            }
        }
    }

    async fn tick(&mut self) {
        if let Some(stream) = &self.stream {
            if stream.is_finished() {
                warn!("GC notification stream ended, no further events will arrive");
                self.health
                    .set_unhealthy(components::EVENT_SOURCE, "GC notification stream closed")
                    .await;
                self.stream = None;
            }
        }

        let verdict = self.monitor.detect();
        let retained = self.monitor.snapshot().len();

        self.logger.log_verdict(&verdict, retained);
        self.health.record_verdict(&verdict).await;
        debug!(status = %verdict.status(), retained = retained, "Detection cycle complete");
    }
}
