//! Runner backends
//!
//! `HttpRunner` delegates to an external test harness; `SimulatedRunner`
//! produces randomized results for demos and dry runs.

mod http;
mod simulated;

pub use http::HttpRunner;
pub use simulated::SimulatedRunner;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RunnerConfig, RunnerMode};
use crate::executor::Runner;

/// Build the runner selected by configuration
pub fn from_config(config: &RunnerConfig) -> Result<Arc<dyn Runner>> {
    match config.mode {
        RunnerMode::Http => {
            let endpoint = config
                .endpoint
                .as_deref()
                .context("runner.endpoint is required in http mode")?;
            Ok(Arc::new(HttpRunner::new(endpoint, config.timeout_secs)?))
        }
        RunnerMode::Simulated => Ok(Arc::new(SimulatedRunner::new(
            config.failure_rate,
            Duration::from_millis(config.simulated_delay_ms),
        ))),
    }
}
