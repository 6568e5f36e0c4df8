//! Error types
//!
//! Configuration, resolution, runner and tracker errors. Test failures are
//! data on the execution record, never errors.

use std::fmt;
use thiserror::Error;

use crate::models::ExecutionStatus;

/// Kind of entity a lookup failed for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Suite,
    Pipeline,
    Execution,
    Run,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Suite => write!(f, "suite"),
            EntityKind::Pipeline => write!(f, "pipeline"),
            EntityKind::Execution => write!(f, "execution"),
            EntityKind::Run => write!(f, "run"),
        }
    }
}

/// Lookup of an unknown id
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} not found: {id}")]
pub struct NotFoundError {
    pub kind: EntityKind,
    pub id: String,
}

impl NotFoundError {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Registration-time configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Suite already registered: {0}")]
    DuplicateSuite(String),

    #[error("Pipeline already registered: {0}")]
    DuplicatePipeline(String),

    #[error("Suite {suite} depends on unknown suite {dependency}")]
    InvalidDependency { suite: String, dependency: String },

    #[error("Cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("Pipeline {pipeline} references unknown suite {suite}")]
    InvalidSuiteReference { pipeline: String, suite: String },

    #[error("Invalid schedule for {owner}: {expression}")]
    InvalidSchedule { owner: String, expression: String },

    #[error("Invalid retry policy for {suite}: {reason}")]
    InvalidRetryPolicy { suite: String, reason: String },
}

/// Dependency resolution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("Cyclic dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },
}

/// Infrastructure failure reported by a runner
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunnerError {
    #[error("Harness unreachable: {0}")]
    Unreachable(String),

    #[error("Harness error: {0}")]
    Harness(String),

    #[error("Invalid harness response: {0}")]
    InvalidResponse(String),
}

/// Execution tracker write errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("Execution {id} is already {status}")]
    TerminalState { id: String, status: ExecutionStatus },

    #[error("Invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },
}

/// Errors surfaced synchronously by the orchestrator API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("Suite {suite} does not accept trigger {trigger}")]
    TriggerNotEnabled { suite: String, trigger: String },
}
