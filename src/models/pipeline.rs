//! Pipeline models
//!
//! Pipelines compose suites; a `RunReport` is the outcome of one suite or
//! pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::execution::ExecutionStatus;
use super::suite::{Environment, Trigger};

/// Opaque notification destination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    /// e.g. "webhook", "slack", "email"
    pub kind: String,
    pub destination: String,
}

impl NotificationTarget {
    pub fn webhook(url: impl Into<String>) -> Self {
        Self {
            kind: "webhook".to_string(),
            destination: url.into(),
        }
    }
}

/// Named composition of suites
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    pub id: String,
    pub name: String,
    pub suites: Vec<String>,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default)]
    pub fail_fast: bool,
    #[serde(default = "all_environments")]
    pub environment: Environment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default)]
    pub notifications: Vec<NotificationTarget>,
}

fn all_environments() -> Environment {
    Environment::All
}

impl PipelineConfig {
    pub fn new(id: impl Into<String>, suites: Vec<&str>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            suites: suites.into_iter().map(String::from).collect(),
            parallel: false,
            fail_fast: false,
            environment: Environment::All,
            schedule: None,
            notifications: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_schedule(mut self, cron: impl Into<String>) -> Self {
        self.schedule = Some(cron.into());
        self
    }

    pub fn notify(mut self, target: NotificationTarget) -> Self {
        self.notifications.push(target);
        self
    }
}

/// Caller-supplied metadata for a run
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub trigger: Option<Trigger>,
    pub build_id: Option<String>,
    pub commit_hash: Option<String>,
}

impl RunOptions {
    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn build(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = Some(build_id.into());
        self
    }

    pub fn commit(mut self, commit_hash: impl Into<String>) -> Self {
        self.commit_hash = Some(commit_hash.into());
        self
    }
}

/// What a run was started for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RunTarget {
    Suite(String),
    Pipeline(String),
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTarget::Suite(id) => write!(f, "suite {id}"),
            RunTarget::Pipeline(id) => write!(f, "pipeline {id}"),
        }
    }
}

/// Overall outcome of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Final state of one suite within a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteOutcome {
    pub suite_id: String,
    pub status: ExecutionStatus,
    /// Number of execution records created (1 + retries)
    pub attempts: u32,
    pub execution_id: String,
}

/// Outcome of a suite or pipeline run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: String,
    pub target: RunTarget,
    pub status: RunStatus,
    pub environment: Environment,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub suites: Vec<SuiteOutcome>,
    #[serde(default)]
    pub notifications: Vec<NotificationTarget>,
}

impl RunReport {
    pub fn count(&self, status: ExecutionStatus) -> usize {
        self.suites.iter().filter(|s| s.status == status).count()
    }

    pub fn outcome(&self, suite_id: &str) -> Option<&SuiteOutcome> {
        self.suites.iter().find(|s| s.suite_id == suite_id)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Completed iff every planned suite completed; cancellation wins over failure
    pub fn summarize(cancelled: bool, suites: &[SuiteOutcome]) -> RunStatus {
        if cancelled {
            RunStatus::Cancelled
        } else if suites.iter().all(|s| s.status.is_success()) {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} - {} [{}]", self.run_id, self.target, self.status)?;
        for suite in &self.suites {
            writeln!(
                f,
                "  {:24} {:10} attempts: {}",
                suite.suite_id, suite.status, suite.attempts
            )?;
        }
        write!(
            f,
            "Completed: {} | Failed: {} | Skipped: {} | Cancelled: {} | Duration: {}ms",
            self.count(ExecutionStatus::Completed),
            self.count(ExecutionStatus::Failed),
            self.count(ExecutionStatus::Skipped),
            self.count(ExecutionStatus::Cancelled),
            self.duration_ms()
        )
    }
}
