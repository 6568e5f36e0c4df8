//! Execution tracking, statistics and history persistence

mod stats;
mod storage;
mod tracker;

pub use stats::{HealthLevel, OverallStats, StatisticsAggregator, SuccessRate, SuiteHealth};
pub use storage::{ExportFormat, HistoryStore, StoredHistory};
pub use tracker::{ExecutionTracker, DEFAULT_HISTORY_LIMIT};
