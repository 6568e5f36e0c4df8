//! Execution models
//!
//! One `TestExecution` per run attempt, plus per-test outcomes and the
//! status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::suite::{Environment, Trigger};

/// Lifecycle status of an execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
    Skipped,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::Skipped
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Completed)
    }

    /// Whether the state machine permits `self -> next`
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Skipped)
                | (Queued, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Queued => write!(f, "queued"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
            ExecutionStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of a single test inside a suite run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pass,
    Fail,
    Skip,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::Pass => write!(f, "PASS"),
            ResultStatus::Fail => write!(f, "FAIL"),
            ResultStatus::Skip => write!(f, "SKIP"),
        }
    }
}

/// Per-test result reported by a runner
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecutionResult {
    pub test_id: String,
    pub status: ResultStatus,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl TestExecutionResult {
    pub fn pass(test_id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            test_id: test_id.into(),
            status: ResultStatus::Pass,
            duration_ms,
            error: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn fail(test_id: impl Into<String>, duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            status: ResultStatus::Fail,
            duration_ms,
            error: Some(error.into()),
            metrics: BTreeMap::new(),
        }
    }

    pub fn skip(test_id: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            status: ResultStatus::Skip,
            duration_ms: 0,
            error: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Terminal status implied by a runner's results.
///
/// Strict gate: every result must pass. An empty result set counts as passing.
pub fn verdict(results: &[TestExecutionResult]) -> ExecutionStatus {
    if results.iter().all(|r| r.status == ResultStatus::Pass) {
        ExecutionStatus::Completed
    } else {
        ExecutionStatus::Failed
    }
}

/// Why an execution did not complete
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Runner reported failing or non-passing tests
    TestFailure,
    /// Runner itself errored (infrastructure, harness unreachable)
    Harness,
    /// Runner did not return within the suite timeout
    Timeout,
    /// A prerequisite suite did not complete
    Dependency,
    /// Suite is bound to a different environment than the run
    Environment,
    /// Pipeline stopped after an earlier failure
    FailFast,
    /// Runner task panicked
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::TestFailure => write!(f, "test failure"),
            FailureKind::Harness => write!(f, "harness failure"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Dependency => write!(f, "dependency"),
            FailureKind::Environment => write!(f, "environment"),
            FailureKind::FailFast => write!(f, "fail-fast"),
            FailureKind::Panicked => write!(f, "panicked"),
        }
    }
}

/// Error detail attached to an execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub kind: FailureKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One attempt to run a suite
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecution {
    pub id: String,
    /// Suite or pipeline run this attempt belongs to
    pub run_id: String,
    pub suite_id: String,
    pub status: ExecutionStatus,
    pub trigger: Trigger,
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: Vec<TestExecutionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    pub attempt: u32,
}

impl TestExecution {
    pub fn queued(
        run_id: impl Into<String>,
        suite_id: impl Into<String>,
        trigger: Trigger,
        environment: Environment,
        attempt: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.into(),
            suite_id: suite_id.into(),
            status: ExecutionStatus::Queued,
            trigger,
            environment,
            build_id: None,
            commit_hash: None,
            queued_at: now,
            start_time: None,
            end_time: None,
            results: Vec::new(),
            error: None,
            attempt,
        }
    }

    pub fn with_build(mut self, build_id: Option<String>, commit_hash: Option<String>) -> Self {
        self.build_id = build_id;
        self.commit_hash = commit_hash;
        self
    }

    /// Wall-clock duration, defined only once terminal and started
    pub fn duration_ms(&self) -> Option<u64> {
        if !self.status.is_terminal() {
            return None;
        }
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds().max(0) as u64),
            _ => None,
        }
    }

    /// Timestamp used to order executions by recency
    pub fn sort_time(&self) -> DateTime<Utc> {
        self.start_time.unwrap_or(self.queued_at)
    }

    pub fn passed_tests(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ResultStatus::Pass)
            .count()
    }

    pub fn failed_tests(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ResultStatus::Fail)
            .count()
    }
}

impl fmt::Display for TestExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} #{} {} [{}]",
            self.suite_id, self.attempt, self.status, self.environment
        )?;
        if let Some(ms) = self.duration_ms() {
            write!(f, " {ms}ms")?;
        }
        if let Some(err) = &self.error {
            write!(f, " - {err}")?;
        }
        Ok(())
    }
}
