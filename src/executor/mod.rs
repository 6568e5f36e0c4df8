//! Execution engine
//!
//! Resolves dependency order, schedules suites onto a runner, and retries
//! failed attempts with exponential backoff.

mod resolver;
mod retry;
mod runner;
mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use resolver::DependencyResolver;
pub use retry::{RetryController, DEFAULT_BASE_DELAY};
pub use runner::{Clock, Runner, SystemClock};
pub use scheduler::{ExecutionHandle, PipelineRunHandle, RunHandle, Scheduler};
