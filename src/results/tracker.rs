//! Execution tracker
//!
//! Bounded, insertion-ordered history of execution records. All writes go
//! through one mutex, so state transitions on an execution are serialized.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{EntityKind, NotFoundError, TrackerError};
use crate::models::{ExecutionError, ExecutionStatus, TestExecution, TestExecutionResult};

/// Default number of records kept before eviction
pub const DEFAULT_HISTORY_LIMIT: usize = 10_000;

/// Owns every execution record; callers receive clones, never references
#[derive(Debug)]
pub struct ExecutionTracker {
    executions: Mutex<IndexMap<String, TestExecution>>,
    capacity: usize,
}

impl ExecutionTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            executions: Mutex::new(IndexMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Append a new record or update an existing one along a legal transition
    pub fn record(&self, execution: TestExecution) -> Result<(), TrackerError> {
        let mut executions = self.executions.lock();

        if let Some(current) = executions.get(&execution.id) {
            if current.status.is_terminal() {
                return Err(TrackerError::TerminalState {
                    id: current.id.clone(),
                    status: current.status,
                });
            }
            if current.status != execution.status
                && !current.status.can_transition_to(execution.status)
            {
                return Err(TrackerError::InvalidTransition {
                    id: current.id.clone(),
                    from: current.status,
                    to: execution.status,
                });
            }
        }

        executions.insert(execution.id.clone(), execution);
        evict(&mut executions, self.capacity);
        Ok(())
    }

    /// `queued -> running`, stamping the start time
    pub fn start(&self, id: &str, now: DateTime<Utc>) -> Result<TestExecution, TrackerError> {
        self.update(id, ExecutionStatus::Running, |exec| {
            exec.start_time = Some(now);
        })
    }

    /// Move to a terminal status, stamping the end time
    pub fn finish(
        &self,
        id: &str,
        status: ExecutionStatus,
        results: Vec<TestExecutionResult>,
        error: Option<ExecutionError>,
        now: DateTime<Utc>,
    ) -> Result<TestExecution, TrackerError> {
        debug_assert!(status.is_terminal());
        self.update(id, status, |exec| {
            exec.end_time = Some(now);
            exec.results = results;
            exec.error = error;
        })
    }

    fn update<F>(
        &self,
        id: &str,
        next: ExecutionStatus,
        apply: F,
    ) -> Result<TestExecution, TrackerError>
    where
        F: FnOnce(&mut TestExecution),
    {
        let mut executions = self.executions.lock();
        let exec = executions
            .get_mut(id)
            .ok_or_else(|| NotFoundError::new(EntityKind::Execution, id))?;

        if exec.status.is_terminal() {
            return Err(TrackerError::TerminalState {
                id: id.to_string(),
                status: exec.status,
            });
        }
        if !exec.status.can_transition_to(next) {
            return Err(TrackerError::InvalidTransition {
                id: id.to_string(),
                from: exec.status,
                to: next,
            });
        }

        debug!("Execution {} ({}): {} -> {}", id, exec.suite_id, exec.status, next);
        exec.status = next;
        apply(exec);
        Ok(exec.clone())
    }

    /// Cancel every queued record of a run; running records are left alone
    pub fn cancel_queued(&self, run_id: &str, now: DateTime<Utc>) -> Vec<String> {
        let mut executions = self.executions.lock();
        let mut cancelled = Vec::new();

        for exec in executions.values_mut() {
            if exec.run_id == run_id && exec.status == ExecutionStatus::Queued {
                exec.status = ExecutionStatus::Cancelled;
                exec.end_time = Some(now);
                cancelled.push(exec.id.clone());
            }
        }

        cancelled
    }

    pub fn get(&self, id: &str) -> Option<TestExecution> {
        self.executions.lock().get(id).cloned()
    }

    /// The `n` most recent executions, newest first
    pub fn recent(&self, n: usize) -> Vec<TestExecution> {
        let mut all = self.newest_first(|_| true);
        all.truncate(n);
        all
    }

    /// Executions currently queued or running
    pub fn active(&self) -> Vec<TestExecution> {
        self.filtered(|e| e.status.is_active())
    }

    pub fn active_for_run(&self, run_id: &str) -> Vec<TestExecution> {
        self.filtered(|e| e.run_id == run_id && e.status.is_active())
    }

    /// Every execution of one suite, newest first
    pub fn history(&self, suite_id: &str) -> Vec<TestExecution> {
        self.newest_first(|e| e.suite_id == suite_id)
    }

    /// Executions of one run in creation order
    pub fn for_run(&self, run_id: &str) -> Vec<TestExecution> {
        self.filtered(|e| e.run_id == run_id)
    }

    /// Full history in creation order
    pub fn snapshot(&self) -> Vec<TestExecution> {
        self.filtered(|_| true)
    }

    /// Load previously persisted terminal records; active or known ids are skipped
    pub fn import(&self, records: impl IntoIterator<Item = TestExecution>) -> usize {
        let mut executions = self.executions.lock();
        let mut imported = 0;

        for record in records {
            if record.status.is_terminal() && !executions.contains_key(&record.id) {
                executions.insert(record.id.clone(), record);
                imported += 1;
            }
        }

        evict(&mut executions, self.capacity);
        imported
    }

    pub fn len(&self) -> usize {
        self.executions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.lock().is_empty()
    }

    fn filtered<P>(&self, predicate: P) -> Vec<TestExecution>
    where
        P: Fn(&TestExecution) -> bool,
    {
        self.executions
            .lock()
            .values()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    fn newest_first<P>(&self, predicate: P) -> Vec<TestExecution>
    where
        P: Fn(&TestExecution) -> bool,
    {
        let mut selected: Vec<TestExecution> = self
            .executions
            .lock()
            .values()
            .rev()
            .filter(|e| predicate(e))
            .cloned()
            .collect();
        // stable: equal timestamps keep newest-inserted first
        selected.sort_by(|a, b| b.sort_time().cmp(&a.sort_time()));
        selected
    }
}

impl Default for ExecutionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

/// Drop the oldest terminal records until within capacity
fn evict(executions: &mut IndexMap<String, TestExecution>, capacity: usize) {
    while executions.len() > capacity {
        let oldest_terminal = executions
            .iter()
            .position(|(_, e)| e.status.is_terminal());
        match oldest_terminal {
            Some(index) => {
                executions.shift_remove_index(index);
            }
            None => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Environment, FailureKind, Trigger};
    use chrono::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn queued(run: &str, suite: &str, at: DateTime<Utc>) -> TestExecution {
        TestExecution::queued(run, suite, Trigger::Manual, Environment::Staging, 0, at)
    }

    #[test]
    fn test_lifecycle() {
        let tracker = ExecutionTracker::default();
        let now = Utc::now();
        let exec = queued("run-1", "unit", now);
        let id = exec.id.clone();

        assert_ok!(tracker.record(exec));
        assert_eq!(tracker.active().len(), 1);

        let running = tracker.start(&id, now).unwrap();
        assert_eq!(running.status, ExecutionStatus::Running);
        assert_eq!(running.start_time, Some(now));

        let done = tracker
            .finish(
                &id,
                ExecutionStatus::Completed,
                vec![TestExecutionResult::pass("t1", 5)],
                None,
                now + Duration::seconds(2),
            )
            .unwrap();
        assert_eq!(done.duration_ms(), Some(2000));
        assert!(tracker.active().is_empty());
    }

    #[test]
    fn test_terminal_is_final() {
        let tracker = ExecutionTracker::default();
        let now = Utc::now();
        let exec = queued("run-1", "unit", now);
        let id = exec.id.clone();
        tracker.record(exec).unwrap();
        tracker
            .finish(&id, ExecutionStatus::Skipped, Vec::new(), None, now)
            .unwrap();

        assert!(matches!(
            tracker.start(&id, now),
            Err(TrackerError::TerminalState { .. })
        ));
        assert_err!(tracker.finish(&id, ExecutionStatus::Failed, Vec::new(), None, now));

        let mut stale = tracker.get(&id).unwrap();
        stale.status = ExecutionStatus::Running;
        assert_err!(tracker.record(stale));
        assert_eq!(tracker.get(&id).unwrap().status, ExecutionStatus::Skipped);
    }

    #[test]
    fn test_invalid_transition() {
        let tracker = ExecutionTracker::default();
        let now = Utc::now();
        let exec = queued("run-1", "unit", now);
        let id = exec.id.clone();
        tracker.record(exec).unwrap();

        let err = tracker
            .finish(&id, ExecutionStatus::Completed, Vec::new(), None, now)
            .unwrap_err();
        assert!(matches!(err, TrackerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_unknown_id() {
        let tracker = ExecutionTracker::default();
        assert!(matches!(
            tracker.start("nope", Utc::now()),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn test_recent_and_history_newest_first() {
        let tracker = ExecutionTracker::default();
        let base = Utc::now();

        for (i, suite) in ["a", "b", "a", "c"].iter().enumerate() {
            let exec = queued("run", suite, base + Duration::seconds(i as i64));
            tracker.record(exec).unwrap();
        }

        let recent: Vec<_> = tracker
            .recent(2)
            .into_iter()
            .map(|e| e.suite_id)
            .collect();
        assert_eq!(recent, vec!["c", "a"]);

        let history = tracker.history("a");
        assert_eq!(history.len(), 2);
        assert!(history[0].queued_at > history[1].queued_at);
    }

    #[test]
    fn test_cancel_queued_leaves_running() {
        let tracker = ExecutionTracker::default();
        let now = Utc::now();
        let first = queued("run-1", "a", now);
        let second = queued("run-1", "b", now);
        let other = queued("run-2", "c", now);
        let (first_id, second_id, other_id) =
            (first.id.clone(), second.id.clone(), other.id.clone());
        for exec in [first, second, other] {
            tracker.record(exec).unwrap();
        }
        tracker.start(&first_id, now).unwrap();

        let cancelled = tracker.cancel_queued("run-1", now);
        assert_eq!(cancelled, vec![second_id.clone()]);
        assert_eq!(
            tracker.get(&first_id).unwrap().status,
            ExecutionStatus::Running
        );
        assert_eq!(
            tracker.get(&second_id).unwrap().status,
            ExecutionStatus::Cancelled
        );
        assert_eq!(
            tracker.get(&other_id).unwrap().status,
            ExecutionStatus::Queued
        );
        assert_eq!(tracker.active_for_run("run-1").len(), 1);
    }

    #[test]
    fn test_eviction_keeps_active_records() {
        let tracker = ExecutionTracker::new(2);
        let now = Utc::now();

        let done = queued("run", "old", now);
        let done_id = done.id.clone();
        tracker.record(done).unwrap();
        tracker
            .finish(
                &done_id,
                ExecutionStatus::Skipped,
                Vec::new(),
                Some(ExecutionError::new(FailureKind::Dependency, "upstream failed")),
                now,
            )
            .unwrap();

        tracker.record(queued("run", "x", now)).unwrap();
        tracker.record(queued("run", "y", now)).unwrap();
        assert_eq!(tracker.len(), 2);
        assert!(tracker.get(&done_id).is_none());

        // nothing terminal left to evict
        tracker.record(queued("run", "z", now)).unwrap();
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_import_skips_active_and_duplicates() {
        let tracker = ExecutionTracker::default();
        let now = Utc::now();

        let mut done = queued("old-run", "unit", now);
        done.status = ExecutionStatus::Completed;
        let active = queued("old-run", "api", now);

        assert_eq!(tracker.import(vec![done.clone(), active]), 1);
        assert_eq!(tracker.import(vec![done]), 0);
        assert_eq!(tracker.len(), 1);
    }
}
