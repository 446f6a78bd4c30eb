//! Average usage detection
//!
//! Flags an overflow when the mean usage over every retained reading is at
//! or above the threshold. `num_measures` only gates when detection starts.

use super::{check_num_measures, check_retention, check_threshold, Detector, Verdict};
use crate::error::ConfigError;
use crate::models::{MemoryReading, Sample};

/// Detects when the average usage across the series exceeds a threshold
///
/// Readings without a known capacity contribute 0% to the average.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageUsageAboveThreshold {
    num_measures: usize,
    threshold_pct: f64,
}

impl AverageUsageAboveThreshold {
    /// # Arguments
    /// * `num_measures` - Minimum number of readings before an overflow can be reported
    /// * `threshold_pct` - Alarm threshold in percent (e.g. `90.0`)
    pub fn new(num_measures: usize, threshold_pct: f64) -> Result<Self, ConfigError> {
        Ok(Self {
            num_measures: check_num_measures(num_measures)?,
            threshold_pct: check_threshold(threshold_pct)?,
        })
    }

    pub fn num_measures(&self) -> usize {
        self.num_measures
    }

    pub fn threshold_pct(&self) -> f64 {
        self.threshold_pct
    }
}

impl Detector for AverageUsageAboveThreshold {
    fn detect(&self, readings: &[Sample<MemoryReading>]) -> Verdict {
        let measures_count = readings.len();
        if measures_count < self.num_measures {
            return Verdict::ok(format!(
                "not enough readings, have: {} but need at least: {}",
                measures_count, self.num_measures
            ));
        }

        let total: f64 = readings
            .iter()
            .map(|sample| sample.payload().usage_pct().unwrap_or(0.0))
            .sum();
        let usage_pct = total / measures_count as f64;

        if usage_pct < self.threshold_pct {
            return Verdict::ok(format!(
                "usage {:.5}% < threshold {:.5}%, have {} readings",
                usage_pct, self.threshold_pct, measures_count
            ));
        }

        Verdict::overflow(format!(
            "usage {:.5}% >= threshold {:.5}%, have {} readings",
            usage_pct, self.threshold_pct, measures_count
        ))
    }

    fn validate(&self, expected_readings: usize) -> Result<(), ConfigError> {
        check_retention(expected_readings, self.num_measures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::test_util::{newest_first, pct, unbounded};
    use crate::detection::Status;

    #[test]
    fn test_rejects_invalid_construction() {
        assert_eq!(
            AverageUsageAboveThreshold::new(0, 90.0),
            Err(ConfigError::InvalidNumMeasures(0))
        );
        assert_eq!(
            AverageUsageAboveThreshold::new(1, 120.0),
            Err(ConfigError::InvalidThreshold(120.0))
        );
        assert!(AverageUsageAboveThreshold::new(1, f64::NAN).is_err());
    }

    #[test]
    fn test_shortfall_is_ok() {
        let detector = AverageUsageAboveThreshold::new(3, 75.0).unwrap();

        let verdict = detector.detect(&newest_first(&[pct(99), pct(99)]));
        assert_eq!(verdict.status(), Status::Ok);
        assert!(verdict.reason().contains("have: 2"));
        assert!(verdict.reason().contains("need at least: 3"));
    }

    #[test]
    fn test_high_average_overflows() {
        let detector = AverageUsageAboveThreshold::new(3, 75.0).unwrap();

        let verdict = detector.detect(&newest_first(&[pct(90), pct(91), pct(96)]));
        assert_eq!(verdict.status(), Status::Overflow);
        assert!(verdict.reason().contains("92.33333%"));
    }

    #[test]
    fn test_low_average_is_ok() {
        let detector = AverageUsageAboveThreshold::new(3, 75.0).unwrap();
        let readings: Vec<MemoryReading> = (0..100).map(|_| pct(50)).collect();

        let verdict = detector.detect(&newest_first(&readings));
        assert_eq!(verdict.status(), Status::Ok);
        assert!(verdict.reason().contains("50.00000%"));
        assert!(verdict.reason().contains("have 100 readings"));
    }

    #[test]
    fn test_average_spans_all_retained_readings() {
        // num_measures = 1, but the old low readings still pull the mean down
        let detector = AverageUsageAboveThreshold::new(1, 75.0).unwrap();
        let verdict = detector.detect(&newest_first(&[pct(100), pct(40), pct(40)]));
        assert_eq!(verdict.status(), Status::Ok);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let detector = AverageUsageAboveThreshold::new(2, 75.0).unwrap();
        let verdict = detector.detect(&newest_first(&[pct(70), pct(80)]));
        assert_eq!(verdict.status(), Status::Overflow);
    }

    #[test]
    fn test_unknown_capacity_contributes_zero() {
        let detector = AverageUsageAboveThreshold::new(2, 60.0).unwrap();

        // (100 + 0) / 2 = 50 < 60
        let verdict = detector.detect(&newest_first(&[pct(100), unbounded(u64::MAX)]));
        assert_eq!(verdict.status(), Status::Ok);
        assert!(verdict.reason().contains("50.00000%"));
    }

    #[test]
    fn test_validate() {
        let detector = AverageUsageAboveThreshold::new(5, 90.0).unwrap();
        assert!(detector.validate(4).is_err());
        assert!(detector.validate(5).is_ok());
        assert!(detector.validate(6).is_ok());
    }
}
