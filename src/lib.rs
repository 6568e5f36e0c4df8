//! Suite Orchestrator - test suite and pipeline orchestration engine
//!
//! Registers test suites and pipelines, resolves suite dependencies into an
//! execution order, runs suites through a pluggable runner with retries and
//! concurrency limits, and tracks every execution for history and statistics.
//!
//! ## Features
//!
//! - Dependency resolution with cycle detection
//! - Sequential or parallel pipelines with fail-fast and priority ordering
//! - Retries with exponential backoff
//! - Cancellation of whole runs
//! - Success rates and suite health over recent executions
//! - Simulated and HTTP runners, webhook notifications
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use suite_orchestrator::models::{PipelineConfig, SuiteType, TestSuite};
//! use suite_orchestrator::runners::SimulatedRunner;
//! use suite_orchestrator::Orchestrator;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let orchestrator =
//!     Orchestrator::builder(Arc::new(SimulatedRunner::new(0.1, Duration::from_millis(50)))).build();
//!
//! orchestrator.register_suite(TestSuite::new("smoke", SuiteType::Integration))?;
//! orchestrator.register_suite(TestSuite::new("api", SuiteType::Integration).depends_on("smoke"))?;
//! orchestrator.register_pipeline(PipelineConfig::new("ci", vec!["api"]).fail_fast(true))?;
//!
//! let report = orchestrator.run_pipeline("ci")?.wait().await?;
//! println!("{} {}", report.run_id, report.status);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod output;
pub mod registry;
pub mod results;
pub mod runners;
pub mod utils;

pub use error::{
    EntityKind, NotFoundError, OrchestratorError, RegistryError, ResolveError, RunnerError,
    TrackerError,
};
pub use executor::{ExecutionHandle, PipelineRunHandle, RunHandle, Runner};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, Stats};
