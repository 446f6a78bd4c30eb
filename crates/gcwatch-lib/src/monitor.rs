//! Overflow monitor
//!
//! Wires an event source, an expiring time series and a detector together:
//! matching GC events are recorded as memory readings, and `detect()`
//! classifies whatever the series currently retains.

use crate::detection::{Detector, OverflowDetector, Verdict};
use crate::error::{ConfigError, SourceError};
use crate::listeners::{listener, Listener};
use crate::models::{GcCollection, MemoryReading, PoolType, Sample};
use crate::observability::MonitorMetrics;
use crate::series::{Expiry, Snapshot, TimeSeries};
use crate::source::{EventSource, GcSample};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Which GC events feed the series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Collection class to record (default: major)
    #[serde(default = "default_collection")]
    pub collection: GcCollection,
    /// Pool whose reading is recorded (default: old generation)
    #[serde(default = "default_pool")]
    pub pool: PoolType,
}

fn default_collection() -> GcCollection {
    GcCollection::Major
}

fn default_pool() -> PoolType {
    PoolType::Old
}

impl Default for EventFilter {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            pool: default_pool(),
        }
    }
}

impl EventFilter {
    /// The reading to record for `event`, if it passes the filter
    pub fn select(&self, event: &GcSample) -> Option<Sample<MemoryReading>> {
        let gc = event.payload();
        if gc.collection() != self.collection {
            return None;
        }
        gc.reading(self.pool)
            .map(|reading| Sample::new(event.timestamp(), *reading))
    }
}

/// State shared between the monitor and its source listener
struct MonitorState {
    series: TimeSeries<MemoryReading>,
    expiry: Expiry,
    detector: OverflowDetector,
    filter: EventFilter,
    metrics: MonitorMetrics,
}

impl MonitorState {
    fn handle(&self, event: &GcSample) -> bool {
        self.metrics.inc_events_received();

        let Some(sample) = self.filter.select(event) else {
            self.metrics.inc_events_filtered();
            debug!(
                collection = %event.payload().collection(),
                wanted_collection = %self.filter.collection,
                wanted_pool = %self.filter.pool,
                "Ignoring GC event"
            );
            return false;
        };

        let evicted = self.series.insert_and_evict(sample, &self.expiry);

        self.metrics.inc_samples_accepted();
        self.metrics.add_samples_evicted(evicted);
        self.metrics.set_series_len(self.series.len());
        true
    }
}

/// Detects memory overflow from GC events delivered by an [`EventSource`]
///
/// The monitor subscribes to the source when built and unsubscribes when
/// dropped.
pub struct OverflowMonitor {
    source: Arc<dyn EventSource>,
    state: Arc<MonitorState>,
    listener: Listener<GcSample>,
}

impl OverflowMonitor {
    /// Create a monitor recording major collections of the old generation
    pub fn new(
        source: Arc<dyn EventSource>,
        expiry: Expiry,
        detector: impl Into<OverflowDetector>,
    ) -> Result<Self, ConfigError> {
        Self::builder()
            .source(source)
            .expiry(expiry)
            .detector(detector)
            .build()
    }

    pub fn builder() -> OverflowMonitorBuilder {
        OverflowMonitorBuilder::new()
    }

    /// Record an event, returning whether it passed the filter
    ///
    /// Called by the source for every delivered event.
    pub fn handle(&self, event: &GcSample) -> bool {
        self.state.handle(event)
    }

    /// Start the underlying event source
    pub fn start(&self) -> Result<(), SourceError> {
        self.source.start()
    }

    /// Stop the underlying event source
    pub fn stop(&self) {
        self.source.stop();
    }

    /// Classify the currently retained readings
    pub fn detect(&self) -> Verdict {
        let start = Instant::now();
        let snapshot = self.state.series.snapshot();
        let verdict = self.state.detector.detect(&snapshot);

        self.state
            .metrics
            .observe_detect_latency(start.elapsed().as_secs_f64());
        if verdict.is_overflow() {
            self.state.metrics.inc_overflow_verdicts();
        }
        verdict
    }

    /// Currently retained readings, newest first
    pub fn snapshot(&self) -> Snapshot<MemoryReading> {
        self.state.series.snapshot()
    }

    pub fn expiry(&self) -> &Expiry {
        &self.state.expiry
    }

    pub fn detector(&self) -> &OverflowDetector {
        &self.state.detector
    }

    pub fn filter(&self) -> EventFilter {
        self.state.filter
    }
}

impl Drop for OverflowMonitor {
    fn drop(&mut self) {
        self.source.remove_listener(&self.listener);
    }
}

/// Builder for an [`OverflowMonitor`]
pub struct OverflowMonitorBuilder {
    source: Option<Arc<dyn EventSource>>,
    expiry: Option<Expiry>,
    detector: Option<OverflowDetector>,
    filter: EventFilter,
}

impl OverflowMonitorBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            expiry: None,
            detector: None,
            filter: EventFilter::default(),
        }
    }

    pub fn source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn detector(mut self, detector: impl Into<OverflowDetector>) -> Self {
        self.detector = Some(detector.into());
        self
    }

    pub fn filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Validate the configuration and subscribe to the source
    pub fn build(self) -> Result<OverflowMonitor, ConfigError> {
        let source = self.source.ok_or(ConfigError::MissingComponent("source"))?;
        let expiry = self.expiry.ok_or(ConfigError::MissingComponent("expiry"))?;
        let detector = self
            .detector
            .ok_or(ConfigError::MissingComponent("detector"))?;

        if let Some(expected) = expiry.expected_readings() {
            detector.validate(expected)?;
        }

        let state = Arc::new(MonitorState {
            series: TimeSeries::new(),
            expiry,
            detector,
            filter: self.filter,
            metrics: MonitorMetrics::new(),
        });

        // Weak so that a source outliving the monitor does not keep the series alive
        let weak = Arc::downgrade(&state);
        let listener = listener(move |event: &GcSample| {
            if let Some(state) = weak.upgrade() {
                state.handle(event);
            }
            Ok(())
        });
        source.add_listener(Arc::clone(&listener));

        Ok(OverflowMonitor {
            source,
            state,
            listener,
        })
    }
}

impl Default for OverflowMonitorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
