//! Deterministic collaborators for scheduler tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::{Clock, Runner};
use crate::error::RunnerError;
use crate::models::{Environment, RunReport, TestExecutionResult};
use crate::notify::NotificationSink;

/// What a scripted runner does for one attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Pass,
    Fail,
    HarnessError,
    Panic,
    Hang,
}

/// One recorded runner call
#[derive(Clone, Debug)]
pub(crate) struct Invocation {
    pub suite_id: String,
    pub environment: Environment,
    pub attempt: u32,
    pub started: Instant,
    pub finished: Instant,
}

/// Runner whose per-suite, per-attempt behavior is fixed up front.
///
/// The last scripted step repeats for later attempts; unscripted suites pass.
pub(crate) struct ScriptedRunner {
    script: HashMap<String, Vec<Step>>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    calls: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            script: HashMap::new(),
            delays: HashMap::new(),
            default_delay: Duration::from_millis(5),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn script(mut self, suite_id: &str, steps: &[Step]) -> Self {
        self.script.insert(suite_id.to_string(), steps.to_vec());
        self
    }

    pub fn delay(mut self, suite_id: &str, delay: Duration) -> Self {
        self.delays.insert(suite_id.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, suite_id: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.suite_id == suite_id)
            .collect()
    }

    fn step(&self, suite_id: &str, attempt: u32) -> Step {
        self.script
            .get(suite_id)
            .and_then(|steps| steps.get(attempt as usize).or_else(|| steps.last()))
            .copied()
            .unwrap_or(Step::Pass)
    }
}

#[async_trait]
impl Runner for ScriptedRunner {
    async fn invoke(
        &self,
        suite_id: &str,
        environment: Environment,
        attempt: u32,
    ) -> Result<Vec<TestExecutionResult>, RunnerError> {
        let started = Instant::now();
        let delay = self
            .delays
            .get(suite_id)
            .copied()
            .unwrap_or(self.default_delay);
        let step = self.step(suite_id, attempt);

        if step == Step::Hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        } else {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().push(Invocation {
            suite_id: suite_id.to_string(),
            environment,
            attempt,
            started,
            finished: Instant::now(),
        });

        match step {
            Step::Pass | Step::Hang => Ok(vec![
                TestExecutionResult::pass(format!("{suite_id}::first"), 3),
                TestExecutionResult::pass(format!("{suite_id}::second"), 4),
            ]),
            Step::Fail => Ok(vec![
                TestExecutionResult::pass(format!("{suite_id}::first"), 3),
                TestExecutionResult::fail(format!("{suite_id}::second"), 4, "expected 200, got 500"),
            ]),
            Step::HarnessError => Err(RunnerError::Unreachable("connection refused".to_string())),
            Step::Panic => panic!("runner blew up on {suite_id}"),
        }
    }
}

/// Clock that records requested sleeps and returns immediately
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        // strictly increasing so start/end ordering is observable
        let mut now = self.now.lock();
        *now += chrono::Duration::milliseconds(1);
        *now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        if let Ok(step) = chrono::Duration::from_std(duration) {
            *self.now.lock() += step;
        }
        tokio::task::yield_now().await;
    }
}

/// Sink that keeps every report it receives
#[derive(Clone, Default)]
pub(crate) struct RecordingSink {
    reports: Arc<Mutex<Vec<RunReport>>>,
}

impl RecordingSink {
    pub fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, report: &RunReport) {
        self.reports.lock().push(report.clone());
    }
}

/// Highest number of invocations that were in flight at the same instant
pub(crate) fn max_overlap(calls: &[Invocation]) -> usize {
    calls
        .iter()
        .map(|a| {
            calls
                .iter()
                .filter(|b| b.started <= a.started && a.started < b.finished)
                .count()
        })
        .max()
        .unwrap_or(0)
}

pub(crate) fn overlaps(a: &Invocation, b: &Invocation) -> bool {
    a.started < b.finished && b.started < a.finished
}
