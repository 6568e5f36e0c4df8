//! Runner and clock collaborators
//!
//! The scheduler never runs tests itself. It asks a `Runner` for results and
//! takes time from a `Clock`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::error::RunnerError;
use crate::models::{Environment, TestExecutionResult};

/// Performs one suite run out of process and reports per-test results
#[async_trait]
pub trait Runner: Send + Sync {
    async fn invoke(
        &self,
        suite_id: &str,
        environment: Environment,
        attempt: u32,
    ) -> Result<Vec<TestExecutionResult>, RunnerError>;
}

/// Source of timestamps and backoff waits
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio timers
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
