//! Agent configuration
//!
//! Layered from an optional TOML file and `GCWATCH_` environment variables;
//! nested keys use `__` (e.g. `GCWATCH_MONITOR__DETECTOR__THRESHOLD_PCT`).

use anyhow::{Context, Result};
use gcwatch_lib::MonitorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
const CONFIG_PATH_VAR: &str = "GCWATCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "gcwatch.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name attached to every structured log record
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for health/metrics/verdict
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between two detections
    #[serde(default = "default_detect_interval")]
    pub detect_interval_secs: u64,

    /// Notification stream to read; stdin when absent
    #[serde(default)]
    pub input: Option<PathBuf>,

    #[serde(default)]
    pub monitor: MonitorConfig,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "gcwatch".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_detect_interval() -> u64 {
    10
}

impl AgentConfig {
    /// Load configuration from the config file named by `GCWATCH_CONFIG`
    /// (default `gcwatch.toml`) and the environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load configuration from `path` (if it exists) and the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("GCWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .context("invalid agent configuration")
    }

    pub fn detect_interval(&self) -> Duration {
        Duration::from_secs(self.detect_interval_secs.max(1))
    }
}
