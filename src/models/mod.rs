//! Data models for suite orchestration
//!
//! This module contains the suite, pipeline and execution records shared by
//! every other component.

mod execution;
mod pipeline;
mod suite;

pub use execution::{
    verdict, ExecutionError, ExecutionStatus, FailureKind, ResultStatus, TestExecution,
    TestExecutionResult,
};
pub use pipeline::{
    NotificationTarget, PipelineConfig, RunOptions, RunReport, RunStatus, RunTarget, SuiteOutcome,
};
pub use suite::{is_cron_like, Environment, Priority, RetryPolicy, SuiteType, TestSuite, Trigger};
