//! Configuration module
//!
//! Handles loading and managing configuration.

mod file;

pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::Environment;

/// Application configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Scheduling behavior
    pub scheduler: SchedulerConfig,

    /// How suites are actually executed
    pub runner: RunnerConfig,

    /// Where execution history is persisted (platform data dir when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;

        let config: Self = if file::is_yaml_file(path.as_ref()) {
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?
        } else {
            serde_json::from_str(&content).context("Failed to parse JSON config")?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.max_concurrent == 0 {
            anyhow::bail!("scheduler.max_concurrent must be at least 1");
        }
        if self.scheduler.history_limit == 0 {
            anyhow::bail!("scheduler.history_limit must be at least 1");
        }
        if self.scheduler.default_environment == Environment::All {
            anyhow::bail!("scheduler.default_environment must name a concrete environment");
        }
        if !(0.0..=1.0).contains(&self.runner.failure_rate) {
            anyhow::bail!(
                "runner.failure_rate must be between 0 and 1, got {}",
                self.runner.failure_rate
            );
        }
        if self.runner.mode == RunnerMode::Http && self.runner.endpoint.is_none() {
            anyhow::bail!("runner.endpoint is required when runner.mode is http");
        }
        Ok(())
    }
}

/// Scheduler settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum simultaneous runner invocations
    pub max_concurrent: usize,

    /// Base delay between retry attempts in milliseconds
    pub base_delay_ms: u64,

    /// Execution records kept in memory
    pub history_limit: usize,

    /// Environment used when neither run nor suite names one
    pub default_environment: Environment,

    /// Runner timeout for suites without their own
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_timeout_secs: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            base_delay_ms: 1000,
            history_limit: 10_000,
            default_environment: Environment::Development,
            suite_timeout_secs: None,
        }
    }
}

impl SchedulerConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn suite_timeout(&self) -> Option<Duration> {
        self.suite_timeout_secs.map(Duration::from_secs)
    }
}

/// Runner backend selection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerMode {
    Simulated,
    Http,
}

/// Runner settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub mode: RunnerMode,

    /// Base URL of the test harness (http mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Probability that a simulated test fails
    pub failure_rate: f64,

    /// Simulated run time per suite in milliseconds
    pub simulated_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: RunnerMode::Simulated,
            endpoint: None,
            timeout_secs: 300,
            failure_rate: 0.1,
            simulated_delay_ms: 200,
        }
    }
}
