//! Test suite definitions
//!
//! Defines suites, their classification, triggers and retry policy.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of tests a suite contains
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteType {
    Integration,
    Performance,
    Regression,
    Security,
    Accessibility,
}

impl SuiteType {
    pub fn name(&self) -> &'static str {
        match self {
            SuiteType::Integration => "integration",
            SuiteType::Performance => "performance",
            SuiteType::Regression => "regression",
            SuiteType::Security => "security",
            SuiteType::Accessibility => "accessibility",
        }
    }

    pub fn all() -> Vec<SuiteType> {
        vec![
            SuiteType::Integration,
            SuiteType::Performance,
            SuiteType::Regression,
            SuiteType::Security,
            SuiteType::Accessibility,
        ]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        SuiteType::all()
            .into_iter()
            .find(|t| t.name() == s.to_lowercase())
    }
}

impl fmt::Display for SuiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Suite priority, ordered from most to least urgent
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Target environment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
    All,
}

impl Environment {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "staging" => Some(Environment::Staging),
            "production" | "prod" => Some(Environment::Production),
            "all" => Some(Environment::All),
            _ => None,
        }
    }

    /// Environment a suite actually runs in when requested by a run targeting `self`.
    ///
    /// Returns `None` when the suite is bound to a different concrete environment.
    pub fn effective_for(self, suite_env: Environment, fallback: Environment) -> Option<Self> {
        match (self, suite_env) {
            (Environment::All, Environment::All) => Some(fallback),
            (Environment::All, env) => Some(env),
            (run, Environment::All) => Some(run),
            (run, env) if run == env => Some(run),
            _ => None,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
            Environment::All => write!(f, "all"),
        }
    }
}

/// Event that may start a suite run
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    Manual,
    Schedule { cron: String },
    Webhook,
    Commit,
    Deploy,
    Api,
}

impl Trigger {
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Schedule { .. } => "schedule",
            Trigger::Webhook => "webhook",
            Trigger::Commit => "commit",
            Trigger::Deploy => "deploy",
            Trigger::Api => "api",
        }
    }

    pub fn same_kind(&self, other: &Trigger) -> bool {
        self.kind() == other.kind()
    }

    /// Parse a trigger kind without payload; schedules need a cron expression
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Some(Trigger::Manual),
            "webhook" => Some(Trigger::Webhook),
            "commit" => Some(Trigger::Commit),
            "deploy" => Some(Trigger::Deploy),
            "api" => Some(Trigger::Api),
            _ => None,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Schedule { cron } => write!(f, "schedule({cron})"),
            other => f.write_str(other.kind()),
        }
    }
}

/// Loose check for a cron-like expression (5 or 6 fields)
pub fn is_cron_like(expr: &str) -> bool {
    let fields = expr.split_whitespace().count();
    fields == 5 || fields == 6
}

/// Retry policy for failed executions
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_multiplier: f64) -> Self {
        Self {
            max_retries,
            backoff_multiplier: backoff_multiplier.max(1.0),
        }
    }

    pub fn none() -> Self {
        Self::new(0, 1.0)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Immutable test suite definition
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuite {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub suite_type: SuiteType,
    #[serde(default)]
    pub priority: Priority,
    /// Advisory duration in seconds, used for ETA display only
    #[serde(default)]
    pub estimated_duration: u64,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default = "any_environment")]
    pub environment: Environment,
    #[serde(default)]
    pub parallelizable: bool,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Hard wall-clock limit for a single runner invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn any_environment() -> Environment {
    Environment::All
}

impl TestSuite {
    pub fn new(id: impl Into<String>, suite_type: SuiteType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            suite_type,
            priority: Priority::default(),
            estimated_duration: 0,
            dependencies: Vec::new(),
            triggers: Vec::new(),
            environment: Environment::All,
            parallelizable: false,
            retry_policy: RetryPolicy::default(),
            timeout_secs: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimated_duration(mut self, secs: u64) -> Self {
        self.estimated_duration = secs;
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.dependencies.contains(&id) {
            self.dependencies.push(id);
        }
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn parallelizable(mut self, parallelizable: bool) -> Self {
        self.parallelizable = parallelizable;
        self
    }

    pub fn with_retry(mut self, max_retries: u32, backoff_multiplier: f64) -> Self {
        self.retry_policy = RetryPolicy::new(max_retries, backoff_multiplier);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Whether `trigger` may start this suite. An empty trigger list accepts anything.
    pub fn accepts(&self, trigger: &Trigger) -> bool {
        self.triggers.is_empty() || self.triggers.iter().any(|t| t.same_kind(trigger))
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.id, self.suite_type, self.priority)
    }
}
