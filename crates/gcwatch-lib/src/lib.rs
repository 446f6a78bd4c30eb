//! Core library for JVM memory overflow detection
//!
//! This crate provides:
//! - Expiring time series of memory readings
//! - Overflow detectors over those series
//! - GC event sources (in-process and newline-delimited JSON streams)
//! - The overflow monitor wiring them together
//! - Health checks and observability

pub mod config;
pub mod detection;
pub mod error;
pub mod health;
pub mod listeners;
pub mod models;
pub mod monitor;
pub mod observability;
pub mod series;
pub mod source;
pub mod watch;

pub use config::{DetectorConfig, ExpiryConfig, MonitorConfig};
pub use detection::{
    AverageUsageAboveThreshold, Detector, OverflowDetector, Status, UsageAboveThreshold, Verdict,
};
pub use error::{ConfigError, NotificationError, ReadingError, SourceError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use listeners::{listener, EventListeners, Listener};
pub use models::*;
pub use monitor::{EventFilter, OverflowMonitor, OverflowMonitorBuilder};
pub use observability::{MonitorMetrics, StructuredLogger};
pub use series::{Expiry, ExpiryParams, Snapshot, TimeSeries};
pub use source::{EventSource, GcSample, PushEventSource, StreamEventSource};
pub use watch::{WatchConfig, WatchLoop};
