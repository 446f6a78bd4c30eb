//! Observability infrastructure for the overflow detector
//!
//! Provides:
//! - Prometheus metrics (event flow, series size, detection latency, verdicts)
//! - Structured JSON logging with tracing

use crate::detection::{OverflowDetector, Verdict};
use crate::series::Expiry;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for detection latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    events_received: IntCounter,
    samples_accepted: IntCounter,
    events_filtered: IntCounter,
    samples_evicted: IntCounter,
    series_len: IntGauge,
    detect_latency_seconds: Histogram,
    overflow_verdicts: IntCounter,
    listener_failures: IntCounter,
    notifications_rejected: IntCounter,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            events_received: register_int_counter!(
                "gcwatch_events_received_total",
                "GC events delivered to the monitor"
            )
            .expect("Failed to register events_received"),

            samples_accepted: register_int_counter!(
                "gcwatch_samples_accepted_total",
                "GC events that matched the filter and were added to the series"
            )
            .expect("Failed to register samples_accepted"),

            events_filtered: register_int_counter!(
                "gcwatch_events_filtered_total",
                "GC events dropped because of their collection class or missing pool"
            )
            .expect("Failed to register events_filtered"),

            samples_evicted: register_int_counter!(
                "gcwatch_samples_evicted_total",
                "Samples removed from the series by the eviction policy"
            )
            .expect("Failed to register samples_evicted"),

            series_len: register_int_gauge!(
                "gcwatch_series_len",
                "Number of samples currently retained"
            )
            .expect("Failed to register series_len"),

            detect_latency_seconds: register_histogram!(
                "gcwatch_detect_latency_seconds",
                "Time spent classifying the retained samples",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register detect_latency_seconds"),

            overflow_verdicts: register_int_counter!(
                "gcwatch_overflow_verdicts_total",
                "Detections that reported an overflow"
            )
            .expect("Failed to register overflow_verdicts"),

            listener_failures: register_int_counter!(
                "gcwatch_listener_failures_total",
                "Listener invocations that returned an error or panicked"
            )
            .expect("Failed to register listener_failures"),

            notifications_rejected: register_int_counter!(
                "gcwatch_notifications_rejected_total",
                "GC notifications that could not be parsed or were not supported"
            )
            .expect("Failed to register notifications_rejected"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn inc_events_received(&self) {
        self.inner().events_received.inc();
    }

    pub fn inc_samples_accepted(&self) {
        self.inner().samples_accepted.inc();
    }

    pub fn inc_events_filtered(&self) {
        self.inner().events_filtered.inc();
    }

    pub fn add_samples_evicted(&self, count: usize) {
        self.inner().samples_evicted.inc_by(count as u64);
    }

    pub fn set_series_len(&self, len: usize) {
        self.inner().series_len.set(len as i64);
    }

    pub fn observe_detect_latency(&self, duration_secs: f64) {
        self.inner().detect_latency_seconds.observe(duration_secs);
    }

    pub fn inc_overflow_verdicts(&self) {
        self.inner().overflow_verdicts.inc();
    }

    pub fn add_listener_failures(&self, count: usize) {
        self.inner().listener_failures.inc_by(count as u64);
    }

    pub fn inc_notifications_rejected(&self) {
        self.inner().notifications_rejected.inc();
    }
}

/// Structured logger for monitor lifecycle and verdicts
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log monitor startup with the active policy and detector
    pub fn log_startup(&self, version: &str, expiry: &Expiry, detector: &OverflowDetector) {
        info!(
            event = "monitor_started",
            instance = %self.instance,
            version = %version,
            expiry = %expiry,
            detector = %detector,
            "GC overflow monitor started"
        );
    }

    /// Log a verdict; overflows are warnings, everything else is debug noise
    pub fn log_verdict(&self, verdict: &Verdict, retained: usize) {
        if verdict.is_overflow() {
            warn!(
                event = "overflow_detected",
                instance = %self.instance,
                status = %verdict.status(),
                reason = %verdict.reason(),
                retained = retained,
                "Memory overflow detected"
            );
        } else {
            debug!(
                event = "verdict",
                instance = %self.instance,
                status = %verdict.status(),
                reason = %verdict.reason(),
                retained = retained,
                "No overflow"
            );
        }
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            instance = %self.instance,
            reason = %reason,
            "GC overflow monitor shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::UsageAboveThreshold;

    #[test]
    fn test_monitor_metrics_creation() {
        let metrics = MonitorMetrics::new();
        let before = GLOBAL_METRICS.get().unwrap().samples_evicted.get();

        metrics.inc_events_received();
        metrics.add_samples_evicted(3);
        metrics.set_series_len(7);
        metrics.observe_detect_latency(0.0001);

        assert!(GLOBAL_METRICS.get().unwrap().samples_evicted.get() >= before + 3);
    }

    #[test]
    fn test_metrics_handles_share_registry() {
        let a = MonitorMetrics::new();
        let b = a.clone();
        a.inc_notifications_rejected();
        b.inc_notifications_rejected();
        assert!(GLOBAL_METRICS.get().unwrap().notifications_rejected.get() >= 2);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance, "test-instance");

        let detector = UsageAboveThreshold::new(1, 90.0).unwrap().into();
        logger.log_startup("0.1.0", &Expiry::never(), &detector);
        logger.log_verdict(&Verdict::overflow("full"), 3);
        logger.log_shutdown("test");
    }
}
