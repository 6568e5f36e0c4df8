//! Statistics over execution history
//!
//! All figures are pure functions of the tracker contents at call time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::ExecutionTracker;
use crate::models::{ExecutionStatus, TestExecution, TestSuite};

/// Success rate over a window of executions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuccessRate {
    pub suite_id: Option<String>,
    pub window: usize,
    pub completed: usize,
    pub terminal: usize,
    /// completed / terminal, 0.0 when `no_data`
    pub rate: f64,
    pub no_data: bool,
}

impl SuccessRate {
    fn from_window(suite_id: Option<String>, window: usize, executions: &[TestExecution]) -> Self {
        let terminal = executions
            .iter()
            .filter(|e| e.status.is_terminal())
            .count();
        let completed = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count();

        Self {
            suite_id,
            window,
            completed,
            terminal,
            rate: if terminal > 0 {
                completed as f64 / terminal as f64
            } else {
                0.0
            },
            no_data: terminal == 0,
        }
    }

    pub fn percent(&self) -> f64 {
        self.rate * 100.0
    }
}

/// Aggregate across all suites
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverallStats {
    pub window: usize,
    /// Terminal executions in the window
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub active: usize,
    pub success_rate: f64,
    /// Mean duration over terminal executions that ran
    pub avg_duration_ms: f64,
    pub no_data: bool,
}

/// Coarse health classification of a suite
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Failing,
    Unknown,
}

impl HealthLevel {
    pub fn from_rate(rate: &SuccessRate) -> Self {
        if rate.no_data {
            HealthLevel::Unknown
        } else if rate.rate >= 0.9 {
            HealthLevel::Healthy
        } else if rate.rate >= 0.5 {
            HealthLevel::Degraded
        } else {
            HealthLevel::Failing
        }
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthLevel::Healthy => write!(f, "healthy"),
            HealthLevel::Degraded => write!(f, "degraded"),
            HealthLevel::Failing => write!(f, "failing"),
            HealthLevel::Unknown => write!(f, "unknown"),
        }
    }
}

/// Per-suite health summary
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuiteHealth {
    pub suite_id: String,
    pub success: SuccessRate,
    pub avg_duration_ms: f64,
    pub last_status: Option<ExecutionStatus>,
    pub level: HealthLevel,
}

/// Derives statistics from the execution tracker
#[derive(Clone, Debug)]
pub struct StatisticsAggregator {
    tracker: Arc<ExecutionTracker>,
}

impl StatisticsAggregator {
    pub fn new(tracker: Arc<ExecutionTracker>) -> Self {
        Self { tracker }
    }

    /// Completed share of the terminal executions among the last `window` runs of a suite
    pub fn success_rate(&self, suite_id: &str, window: usize) -> SuccessRate {
        let mut history = self.tracker.history(suite_id);
        history.truncate(window);
        SuccessRate::from_window(Some(suite_id.to_string()), window, &history)
    }

    /// Totals over the last `window` executions of any suite
    pub fn overall_stats(&self, window: usize) -> OverallStats {
        let recent = self.tracker.recent(window);
        let rate = SuccessRate::from_window(None, window, &recent);
        let count = |status: ExecutionStatus| recent.iter().filter(|e| e.status == status).count();

        OverallStats {
            window,
            total: rate.terminal,
            passed: rate.completed,
            failed: count(ExecutionStatus::Failed),
            skipped: count(ExecutionStatus::Skipped),
            cancelled: count(ExecutionStatus::Cancelled),
            active: recent.iter().filter(|e| e.status.is_active()).count(),
            success_rate: rate.rate,
            avg_duration_ms: mean_duration(&recent),
            no_data: rate.no_data,
        }
    }

    /// Health of each given suite over its last `window` executions
    pub fn suite_health<'a>(
        &self,
        suites: impl IntoIterator<Item = &'a TestSuite>,
        window: usize,
    ) -> Vec<SuiteHealth> {
        suites
            .into_iter()
            .map(|suite| {
                let mut history = self.tracker.history(&suite.id);
                history.truncate(window);
                let success = SuccessRate::from_window(Some(suite.id.clone()), window, &history);

                SuiteHealth {
                    suite_id: suite.id.clone(),
                    avg_duration_ms: mean_duration(&history),
                    last_status: history.first().map(|e| e.status),
                    level: HealthLevel::from_rate(&success),
                    success,
                }
            })
            .collect()
    }
}

fn mean_duration(executions: &[TestExecution]) -> f64 {
    let durations: Vec<u64> = executions.iter().filter_map(|e| e.duration_ms()).collect();
    if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<u64>() as f64 / durations.len() as f64
    }
}
