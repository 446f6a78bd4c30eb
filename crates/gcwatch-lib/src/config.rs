//! Serializable monitor configuration
//!
//! Mirrors the runtime types with plain data so the monitor can be described
//! in a config file or environment variables. Conversion validates every
//! value; nothing is clamped.

use crate::detection::{AverageUsageAboveThreshold, OverflowDetector, UsageAboveThreshold};
use crate::error::ConfigError;
use crate::monitor::{EventFilter, OverflowMonitor};
use crate::series::Expiry;
use crate::source::EventSource;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Eviction policy description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpiryConfig {
    Capacity { max_samples: usize },
    Age { max_age_secs: u64 },
    Never,
    /// Expired only if every listed policy agrees
    AllOf { of: Vec<ExpiryConfig> },
    /// Expired if any listed policy says so
    AnyOf { of: Vec<ExpiryConfig> },
    Not { of: Box<ExpiryConfig> },
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        ExpiryConfig::Capacity { max_samples: 10 }
    }
}

impl ExpiryConfig {
    pub fn build(&self) -> Result<Expiry, ConfigError> {
        match self {
            ExpiryConfig::Capacity { max_samples } => Expiry::capacity(*max_samples),
            ExpiryConfig::Age { max_age_secs } => {
                Ok(Expiry::age(Duration::from_secs(*max_age_secs)))
            }
            ExpiryConfig::Never => Ok(Expiry::never()),
            ExpiryConfig::AllOf { of } => fold(of, "all_of", Expiry::and),
            ExpiryConfig::AnyOf { of } => fold(of, "any_of", Expiry::or),
            ExpiryConfig::Not { of } => Ok(of.build()?.negate()),
        }
    }
}

fn fold(
    policies: &[ExpiryConfig],
    name: &'static str,
    combine: fn(Expiry, Expiry) -> Expiry,
) -> Result<Expiry, ConfigError> {
    let mut built = policies.iter().map(ExpiryConfig::build);
    let first = built.next().ok_or(ConfigError::EmptyComposite(name))??;
    built.try_fold(first, |acc, next| -> Result<Expiry, ConfigError> {
        Ok(combine(acc, next?))
    })
}

/// Detector description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorConfig {
    Consecutive { num_measures: usize, threshold_pct: f64 },
    Average { num_measures: usize, threshold_pct: f64 },
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig::Average {
            num_measures: 5,
            threshold_pct: 90.0,
        }
    }
}

impl DetectorConfig {
    pub fn build(&self) -> Result<OverflowDetector, ConfigError> {
        match self {
            DetectorConfig::Consecutive {
                num_measures,
                threshold_pct,
            } => Ok(UsageAboveThreshold::new(*num_measures, *threshold_pct)?.into()),
            DetectorConfig::Average {
                num_measures,
                threshold_pct,
            } => Ok(AverageUsageAboveThreshold::new(*num_measures, *threshold_pct)?.into()),
        }
    }
}

/// Complete monitor description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub expiry: ExpiryConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub filter: EventFilter,
}

impl MonitorConfig {
    /// Validate the description and wire a monitor onto `source`
    pub fn build(&self, source: Arc<dyn EventSource>) -> Result<OverflowMonitor, ConfigError> {
        OverflowMonitor::builder()
            .source(source)
            .expiry(self.expiry.build()?)
            .detector(self.detector.build()?)
            .filter(self.filter)
            .build()
    }
}
