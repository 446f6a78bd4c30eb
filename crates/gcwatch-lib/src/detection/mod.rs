//! Overflow detection over memory reading time series
//!
//! This module provides detection for:
//! - Sustained high usage (every one of the newest readings above a threshold)
//! - High average usage across all retained readings
//!
//! Detectors are stateless; each call only depends on the snapshot it is given.

mod average;
mod consecutive;
mod verdict;

pub use average::AverageUsageAboveThreshold;
pub use consecutive::UsageAboveThreshold;
pub use verdict::{Status, Verdict};

use crate::error::ConfigError;
use crate::models::{MemoryReading, Sample};
use std::fmt;

/// A classifier over a newest-first series of memory readings
pub trait Detector {
    /// Classify the given readings. Never fails.
    fn detect(&self, readings: &[Sample<MemoryReading>]) -> Verdict;

    /// Fail if a policy retaining at least `expected_readings` samples can
    /// never provide enough data for this detector
    fn validate(&self, expected_readings: usize) -> Result<(), ConfigError> {
        let _ = expected_readings;
        Ok(())
    }
}

/// The closed set of detector kinds a monitor can be configured with
#[derive(Debug, Clone, PartialEq)]
pub enum OverflowDetector {
    Consecutive(UsageAboveThreshold),
    Average(AverageUsageAboveThreshold),
}

impl Detector for OverflowDetector {
    fn detect(&self, readings: &[Sample<MemoryReading>]) -> Verdict {
        match self {
            OverflowDetector::Consecutive(d) => d.detect(readings),
            OverflowDetector::Average(d) => d.detect(readings),
        }
    }

    fn validate(&self, expected_readings: usize) -> Result<(), ConfigError> {
        match self {
            OverflowDetector::Consecutive(d) => d.validate(expected_readings),
            OverflowDetector::Average(d) => d.validate(expected_readings),
        }
    }
}

impl From<UsageAboveThreshold> for OverflowDetector {
    fn from(detector: UsageAboveThreshold) -> Self {
        OverflowDetector::Consecutive(detector)
    }
}

impl From<AverageUsageAboveThreshold> for OverflowDetector {
    fn from(detector: AverageUsageAboveThreshold) -> Self {
        OverflowDetector::Average(detector)
    }
}

impl fmt::Display for OverflowDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowDetector::Consecutive(d) => write!(
                f,
                "consecutive(num_measures={}, threshold_pct={})",
                d.num_measures(),
                d.threshold_pct()
            ),
            OverflowDetector::Average(d) => write!(
                f,
                "average(num_measures={}, threshold_pct={})",
                d.num_measures(),
                d.threshold_pct()
            ),
        }
    }
}

fn check_num_measures(num_measures: usize) -> Result<usize, ConfigError> {
    if num_measures == 0 {
        return Err(ConfigError::InvalidNumMeasures(num_measures));
    }
    Ok(num_measures)
}

fn check_threshold(threshold_pct: f64) -> Result<f64, ConfigError> {
    // Written so that NaN fails too
    if !(threshold_pct > 0.0 && threshold_pct <= 100.0) {
        return Err(ConfigError::InvalidThreshold(threshold_pct));
    }
    Ok(threshold_pct)
}

fn check_retention(expected_readings: usize, num_measures: usize) -> Result<(), ConfigError> {
    if expected_readings < num_measures {
        return Err(ConfigError::InsufficientRetention {
            expected: expected_readings,
            required: num_measures,
        });
    }
    Ok(())
}
