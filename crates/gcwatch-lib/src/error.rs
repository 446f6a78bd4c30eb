//! Error types for the detection core
//!
//! Configuration problems are fatal and surface while the object graph is
//! being built. Nothing in here is ever produced by `detect()`.

use thiserror::Error;

/// Invalid construction-time configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max_samples must be > 0 but was: {0}")]
    InvalidCapacity(usize),

    #[error("num_measures must be > 0 but was: {0}")]
    InvalidNumMeasures(usize),

    #[error("threshold_pct must be 0.0 < x <= 100.0 but was: {0}")]
    InvalidThreshold(f64),

    #[error(
        "cannot get enough data because expected readings < num_measures: {expected} < {required}"
    )]
    InsufficientRetention { expected: usize, required: usize },

    #[error("composite expiry '{0}' needs at least one policy")]
    EmptyComposite(&'static str),

    #[error("{0} is required")]
    MissingComponent(&'static str),
}

/// Invalid memory reading values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadingError {
    #[error("{field} must be >= 0 but was: {value}")]
    Negative { field: &'static str, value: i64 },

    #[error("{field} must be >= -1 but was: {value}")]
    BelowUnknown { field: &'static str, value: i64 },

    #[error("used ({used}) must not exceed committed ({committed})")]
    UsedAboveCommitted { used: u64, committed: u64 },

    #[error("committed ({committed}) must not exceed max ({max})")]
    CommittedAboveMax { committed: u64, max: u64 },
}

/// Failures of an event source lifecycle call
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("event source must be started from within a tokio runtime")]
    NoRuntime,
}

/// Reasons a GC notification could not be turned into an event
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("malformed notification: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("notification action not supported: {0}")]
    UnsupportedAction(String),

    #[error("garbage collector not supported: {0}")]
    UnsupportedCollector(String),

    #[error("no defined pool found for: {0}")]
    UnknownPool(String),

    #[error("invalid reading for pool {pool}: {source}")]
    InvalidReading {
        pool: String,
        #[source]
        source: ReadingError,
    },
}
