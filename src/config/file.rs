//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files, and
//! registering the suites and pipelines they declare.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use super::AppConfig;
use crate::models::{
    Environment, NotificationTarget, PipelineConfig, Priority, SuiteType, TestSuite, Trigger,
};
use crate::orchestrator::Orchestrator;
use crate::registry::order_for_registration;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./suite-orchestrator.yaml",
    "./suite-orchestrator.yml",
    "./.suite-orchestrator.yaml",
    "~/.config/suite-orchestrator/config.yaml",
];

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Full configuration file structure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    /// Application settings
    #[serde(default)]
    pub app: AppConfig,

    /// Suite definitions, in any order
    #[serde(default)]
    pub suites: Vec<TestSuite>,

    /// Pipeline definitions
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            suites: Vec::new(),
            pipelines: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load configuration from default location
    pub fn load_default() -> Result<Self> {
        if let Some(path) = Self::find() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate settings; suite graph errors surface in `apply`
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        self.app.validate()?;

        for suite in &self.suites {
            let multiplier = suite.retry_policy.backoff_multiplier;
            if !multiplier.is_finite() || multiplier < 1.0 {
                anyhow::bail!(
                    "Suite '{}' has backoffMultiplier {}, must be at least 1",
                    suite.id,
                    multiplier
                );
            }
        }

        Ok(())
    }

    /// Register every suite (dependencies first) and pipeline.
    ///
    /// Returns the number of suites and pipelines registered.
    pub fn apply(&self, orchestrator: &Orchestrator) -> Result<(usize, usize)> {
        let ordered = order_for_registration(self.suites.clone(), &orchestrator.suites())
            .context("Invalid suite definitions")?;
        let suite_count = ordered.len();

        for suite in ordered {
            let id = suite.id.clone();
            orchestrator
                .register_suite(suite)
                .with_context(|| format!("Failed to register suite '{id}'"))?;
        }

        for pipeline in &self.pipelines {
            orchestrator
                .register_pipeline(pipeline.clone())
                .with_context(|| format!("Failed to register pipeline '{}'", pipeline.id))?;
        }

        info!(
            "Registered {} suites and {} pipelines",
            suite_count,
            self.pipelines.len()
        );
        Ok((suite_count, self.pipelines.len()))
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            suites: vec![
                TestSuite::new("smoke", SuiteType::Integration)
                    .with_name("Smoke tests")
                    .with_priority(Priority::Critical)
                    .with_estimated_duration(60)
                    .with_trigger(Trigger::Manual)
                    .with_trigger(Trigger::Commit)
                    .parallelizable(true),
                TestSuite::new("api", SuiteType::Integration)
                    .with_name("API contract tests")
                    .with_priority(Priority::High)
                    .with_estimated_duration(300)
                    .depends_on("smoke")
                    .parallelizable(true)
                    .with_retry(2, 2.0),
                TestSuite::new("checkout", SuiteType::Regression)
                    .with_name("Checkout regression")
                    .with_estimated_duration(900)
                    .depends_on("api")
                    .with_retry(1, 1.5),
                TestSuite::new("load", SuiteType::Performance)
                    .with_name("Load test")
                    .with_priority(Priority::Low)
                    .with_estimated_duration(1800)
                    .with_environment(Environment::Staging)
                    .with_trigger(Trigger::Manual)
                    .with_trigger(Trigger::Schedule {
                        cron: "0 2 * * *".to_string(),
                    })
                    .with_timeout(3600),
                TestSuite::new("security-scan", SuiteType::Security)
                    .with_name("Dependency and header scan")
                    .with_priority(Priority::High)
                    .with_estimated_duration(600)
                    .parallelizable(true),
                TestSuite::new("a11y", SuiteType::Accessibility)
                    .with_name("Accessibility audit")
                    .with_priority(Priority::Low)
                    .with_estimated_duration(240)
                    .parallelizable(true),
            ],
            pipelines: vec![
                PipelineConfig::new("ci", vec!["smoke", "api", "checkout"])
                    .with_name("Continuous integration")
                    .fail_fast(true),
                PipelineConfig::new(
                    "nightly",
                    vec!["checkout", "load", "security-scan", "a11y"],
                )
                .with_name("Nightly")
                .parallel(true)
                .with_environment(Environment::Staging)
                .with_schedule("0 3 * * *")
                .notify(NotificationTarget::webhook(
                    "https://hooks.example.com/qa-nightly",
                )),
            ],
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
