//! Retry policy evaluation

use std::time::Duration;

use crate::models::{ExecutionStatus, TestExecution, TestSuite};

/// Default base delay between attempts
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Stateless retry decisions, consulted after each terminal failure
#[derive(Clone, Copy, Debug)]
pub struct RetryController {
    base_delay: Duration,
}

impl RetryController {
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// True iff the execution failed and the suite has retries left
    pub fn should_retry(&self, suite: &TestSuite, execution: &TestExecution) -> bool {
        execution.status == ExecutionStatus::Failed
            && execution.attempt < suite.retry_policy.max_retries
    }

    /// Delay before the attempt following `attempt`: `base * multiplier^attempt`
    pub fn next_delay(&self, suite: &TestSuite, attempt: u32) -> Duration {
        let multiplier = suite.retry_policy.backoff_multiplier.max(1.0);
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let nanos = self.base_delay.as_nanos() as f64 * multiplier.powi(exponent);
        if nanos >= u64::MAX as f64 {
            Duration::from_nanos(u64::MAX)
        } else {
            Duration::from_nanos(nanos.round() as u64)
        }
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY)
    }
}
