//! Sustained usage detection
//!
//! Flags an overflow when each of the newest `num_measures` readings is at
//! or above the threshold.

use super::{check_num_measures, check_retention, check_threshold, Detector, Verdict};
use crate::error::ConfigError;
use crate::models::{MemoryReading, Sample};

/// Detects when all of the newest readings exceed a usage threshold
///
/// Readings without a known capacity still occupy a slot in the inspected
/// window but can never count toward the overflow condition.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageAboveThreshold {
    num_measures: usize,
    threshold_pct: f64,
}

impl UsageAboveThreshold {
    /// # Arguments
    /// * `num_measures` - How many of the newest readings are inspected
    /// * `threshold_pct` - Alarm threshold in percent (e.g. `90.0`)
    pub fn new(num_measures: usize, threshold_pct: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            num_measures: check_num_measures(num_measures)?,
            threshold_pct: check_threshold(threshold_pct)?,
        })
    }

    /// Inspect only the newest reading
    pub fn single(threshold_pct: f64) -> Result<Self, ConfigError> {
        Self::new(1, threshold_pct)
    }

    pub fn num_measures(&self) -> usize {
        self.num_measures
    }

    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }
}

impl Detector for UsageAboveThreshold {
    fn detect(&self, readings: &[Sample<MemoryReading>]) -> Verdict {
        let reading_count = readings.len();
        if reading_count < self.num_measures {
            return Verdict::ok(format!(
                "not enough readings, have: {} but need: {}",
                reading_count, self.num_measures
            ));
        }

        let relevant: Vec<f64> = readings
            .iter()
            .take(self.num_measures)
            .filter_map(|sample| sample.payload().usage_pct())
            .collect();

        let exceeded = relevant
            .iter()
            .filter(|usage| **usage >= self.threshold_pct)
            .count();

        if exceeded >= self.num_measures {
            Verdict::overflow(format!(
                "the last {} readings were above threshold of {}%: {}",
                self.num_measures,
                self.threshold_pct,
                format_usages(&relevant)
            ))
        } else {
            Verdict::ok(format!(
                "have {} readings, only {} of {} exceeded threshold of {}%: {}",
                reading_count,
                exceeded,
                self.num_measures,
                self.threshold_pct,
                format_usages(&relevant)
            ))
        }
    }

    fn validate(&self, expected_readings: usize) -> Result<(), ConfigError> {
        check_retention(expected_readings, self.num_measures)
    }
}

fn format_usages(usages: &[f64]) -> String {
    let parts: Vec<String> = usages.iter().map(|u| format!("{:.2}", u)).collect();
    format!("[{}]", parts.join(", "))
}
