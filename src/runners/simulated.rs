//! Simulated runner

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

use crate::error::RunnerError;
use crate::executor::Runner;
use crate::models::{Environment, TestExecutionResult};

const TESTS_PER_SUITE: usize = 5;

/// Produces random pass/fail results after a fixed delay
#[derive(Clone, Debug)]
pub struct SimulatedRunner {
    failure_rate: f64,
    delay: Duration,
}

impl SimulatedRunner {
    pub fn new(failure_rate: f64, delay: Duration) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            delay,
        }
    }

    fn results(&self, suite_id: &str) -> Vec<TestExecutionResult> {
        let mut rng = rand::rng();
        (1..=TESTS_PER_SUITE)
            .map(|n| {
                let test_id = format!("{suite_id}::case-{n}");
                let duration_ms = rng.random_range(5..50);
                if rng.random_bool(self.failure_rate) {
                    TestExecutionResult::fail(test_id, duration_ms, "simulated failure")
                } else {
                    TestExecutionResult::pass(test_id, duration_ms)
                        .with_metric("assertions", rng.random_range(1..20) as f64)
                }
            })
            .collect()
    }
}

#[async_trait]
impl Runner for SimulatedRunner {
    async fn invoke(
        &self,
        suite_id: &str,
        _environment: Environment,
        _attempt: u32,
    ) -> Result<Vec<TestExecutionResult>, RunnerError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.results(suite_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultStatus;

    #[tokio::test]
    async fn test_never_fails_at_zero_rate() {
        let runner = SimulatedRunner::new(0.0, Duration::ZERO);
        let results = runner
            .invoke("smoke", Environment::Development, 0)
            .await
            .unwrap();
        assert_eq!(results.len(), TESTS_PER_SUITE);
        assert!(results.iter().all(|r| r.status == ResultStatus::Pass));
    }

    #[tokio::test]
    async fn test_always_fails_at_full_rate() {
        let runner = SimulatedRunner::new(1.5, Duration::ZERO);
        let results = runner
            .invoke("smoke", Environment::Development, 0)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.status == ResultStatus::Fail));
    }
}
