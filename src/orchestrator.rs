//! Orchestrator facade
//!
//! The API surface callers use: registration, runs, cancellation, and
//! queries over execution history.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

use crate::config::SchedulerConfig;
use crate::error::{NotFoundError, OrchestratorError, RegistryError};
use crate::executor::{
    Clock, ExecutionHandle, PipelineRunHandle, Runner, Scheduler, SystemClock,
};
use crate::models::{PipelineConfig, RunOptions, TestExecution, TestSuite, Trigger};
use crate::notify::{LogSink, NotificationSink};
use crate::registry::{PipelineRegistry, SuiteRegistry};
use crate::results::{
    ExecutionTracker, OverallStats, StatisticsAggregator, SuccessRate, SuiteHealth,
};

/// Answer to `stats`: one suite, or everything
#[derive(Clone, Debug, PartialEq)]
pub enum Stats {
    Suite(SuccessRate),
    Overall(OverallStats),
}

/// Builder for `Orchestrator`
pub struct OrchestratorBuilder {
    runner: Arc<dyn Runner>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    config: SchedulerConfig,
}

impl OrchestratorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Orchestrator {
        let tracker = Arc::new(ExecutionTracker::new(self.config.history_limit.max(1)));
        let scheduler = Scheduler::new(
            self.runner,
            self.clock,
            self.sink,
            tracker.clone(),
            self.config,
        );

        Orchestrator {
            suites: RwLock::new(Arc::new(SuiteRegistry::new())),
            pipelines: RwLock::new(Arc::new(PipelineRegistry::new())),
            stats: StatisticsAggregator::new(tracker.clone()),
            tracker,
            scheduler,
        }
    }
}

/// Test suite and pipeline orchestrator
pub struct Orchestrator {
    suites: RwLock<Arc<SuiteRegistry>>,
    pipelines: RwLock<Arc<PipelineRegistry>>,
    scheduler: Scheduler,
    tracker: Arc<ExecutionTracker>,
    stats: StatisticsAggregator,
}

impl Orchestrator {
    /// Start building an orchestrator around a runner
    pub fn builder(runner: Arc<dyn Runner>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            runner,
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogSink),
            config: SchedulerConfig::default(),
        }
    }

    /// Register a suite; runs already in flight keep the registry they started with
    pub fn register_suite(&self, suite: TestSuite) -> Result<(), RegistryError> {
        let mut suites = self.suites.write();
        Arc::make_mut(&mut suites).register(suite)
    }

    pub fn register_pipeline(&self, pipeline: PipelineConfig) -> Result<(), RegistryError> {
        let suites = self.suites();
        let mut pipelines = self.pipelines.write();
        Arc::make_mut(&mut pipelines).register(pipeline, &suites)
    }

    /// Snapshot of the suite registry
    pub fn suites(&self) -> Arc<SuiteRegistry> {
        self.suites.read().clone()
    }

    /// Snapshot of the pipeline registry
    pub fn pipelines(&self) -> Arc<PipelineRegistry> {
        self.pipelines.read().clone()
    }

    pub fn run_suite(
        &self,
        suite_id: &str,
        trigger: Trigger,
    ) -> Result<ExecutionHandle, OrchestratorError> {
        self.run_suite_with(suite_id, RunOptions::default().trigger(trigger))
    }

    pub fn run_suite_with(
        &self,
        suite_id: &str,
        options: RunOptions,
    ) -> Result<ExecutionHandle, OrchestratorError> {
        let suites = self.suites();
        self.scheduler.run_suite(&suites, suite_id, options)
    }

    pub fn run_pipeline(&self, pipeline_id: &str) -> Result<PipelineRunHandle, OrchestratorError> {
        self.run_pipeline_with(pipeline_id, RunOptions::default())
    }

    pub fn run_pipeline_with(
        &self,
        pipeline_id: &str,
        options: RunOptions,
    ) -> Result<PipelineRunHandle, OrchestratorError> {
        let pipeline = self.pipelines().get(pipeline_id)?.clone();
        let suites = self.suites();
        self.scheduler.run_pipeline(&suites, &pipeline, options)
    }

    /// Cancel a run by run id or by the id of any of its executions
    pub fn cancel(&self, id: &str) -> Result<(), NotFoundError> {
        self.scheduler.cancel(id)
    }

    pub fn is_running(&self, run_id: &str) -> bool {
        self.scheduler.is_running(run_id)
    }

    pub fn get_execution(&self, id: &str) -> Option<TestExecution> {
        self.tracker.get(id)
    }

    pub fn recent_executions(&self, n: usize) -> Vec<TestExecution> {
        self.tracker.recent(n)
    }

    pub fn active_executions(&self) -> Vec<TestExecution> {
        self.tracker.active()
    }

    pub fn history(&self, suite_id: &str) -> Vec<TestExecution> {
        self.tracker.history(suite_id)
    }

    /// Every execution held in memory, in creation order
    pub fn executions(&self) -> Vec<TestExecution> {
        self.tracker.snapshot()
    }

    /// Seed the tracker with persisted terminal records
    pub fn import_history(&self, records: Vec<TestExecution>) -> usize {
        let imported = self.tracker.import(records);
        info!("Imported {} executions from history", imported);
        imported
    }

    /// Success rate of one suite, or totals across all suites
    pub fn stats(&self, suite_id: Option<&str>, window: usize) -> Stats {
        match suite_id {
            Some(id) => Stats::Suite(self.stats.success_rate(id, window)),
            None => Stats::Overall(self.stats.overall_stats(window)),
        }
    }

    /// Health of every registered suite
    pub fn suite_health(&self, window: usize) -> Vec<SuiteHealth> {
        let suites = self.suites();
        self.stats.suite_health(suites.list_all(), window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{ManualClock, RecordingSink, ScriptedRunner, Step};
    use crate::models::{ExecutionStatus, RunStatus, SuiteType};
    use std::time::Duration;

    fn orchestrator(runner: ScriptedRunner) -> (Orchestrator, RecordingSink) {
        let sink = RecordingSink::default();
        let orchestrator = Orchestrator::builder(Arc::new(runner))
            .clock(Arc::new(ManualClock::new()))
            .sink(Arc::new(sink.clone()))
            .config(SchedulerConfig {
                base_delay_ms: 10,
                ..SchedulerConfig::default()
            })
            .build();
        (orchestrator, sink)
    }

    fn suite(id: &str) -> TestSuite {
        TestSuite::new(id, SuiteType::Regression)
    }

    #[test]
    fn test_registration_errors_leave_registry_unchanged() {
        let (orc, _) = orchestrator(ScriptedRunner::new());
        orc.register_suite(suite("A")).unwrap();

        assert!(matches!(
            orc.register_suite(suite("A")),
            Err(RegistryError::DuplicateSuite(_))
        ));
        assert!(matches!(
            orc.register_suite(suite("B").depends_on("ghost")),
            Err(RegistryError::InvalidDependency { .. })
        ));
        assert!(matches!(
            orc.register_pipeline(PipelineConfig::new("ci", vec!["A", "ghost"])),
            Err(RegistryError::InvalidSuiteReference { .. })
        ));

        assert_eq!(orc.suites().len(), 1);
        assert!(orc.pipelines().is_empty());
    }

    #[test]
    fn test_snapshots_are_stable() {
        let (orc, _) = orchestrator(ScriptedRunner::new());
        orc.register_suite(suite("A")).unwrap();

        let before = orc.suites();
        orc.register_suite(suite("B")).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(orc.suites().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_pipeline_end_to_end() {
        let (orc, sink) = orchestrator(ScriptedRunner::new());
        orc.register_suite(suite("A")).unwrap();
        orc.register_suite(suite("B").depends_on("A")).unwrap();
        orc.register_pipeline(PipelineConfig::new("ci", vec!["B"]).fail_fast(true))
            .unwrap();

        let report = orc.run_pipeline("ci").unwrap().wait().await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        let order: Vec<&str> = report.suites.iter().map(|s| s.suite_id.as_str()).collect();
        assert_eq!(order, vec!["A", "B"]);
        assert!(orc.active_executions().is_empty());
        assert_eq!(orc.recent_executions(10).len(), 2);
        assert_eq!(sink.reports().len(), 1);

        let exec = orc.get_execution(&report.suites[1].execution_id).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_ids() {
        let (orc, _) = orchestrator(ScriptedRunner::new());

        assert!(matches!(
            orc.run_pipeline("nope"),
            Err(OrchestratorError::NotFound(_))
        ));
        assert!(matches!(
            orc.run_suite("nope", Trigger::Manual),
            Err(OrchestratorError::NotFound(_))
        ));
        assert!(orc.cancel("nope").is_err());
        assert!(orc.get_execution("nope").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_by_execution_id() {
        let (orc, _) = orchestrator(ScriptedRunner::new().script("slow", &[Step::Hang]));
        orc.register_suite(suite("slow")).unwrap();
        orc.register_suite(suite("next")).unwrap();
        orc.register_pipeline(PipelineConfig::new("ci", vec!["slow", "next"]))
            .unwrap();

        let handle = orc.run_pipeline("ci").unwrap();
        let queued_id = handle.execution_ids()[1].clone();
        orc.cancel(&queued_id).unwrap();

        assert_eq!(
            orc.get_execution(&queued_id).map(|e| e.status),
            Some(ExecutionStatus::Cancelled)
        );
        let report = handle.wait().await.unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_after_runs() {
        let runner = ScriptedRunner::new()
            .script("flaky", &[Step::Fail])
            .delay("flaky", Duration::from_millis(1));
        let (orc, _) = orchestrator(runner);
        orc.register_suite(suite("flaky")).unwrap();
        orc.register_suite(suite("solid")).unwrap();

        for id in ["flaky", "solid", "solid"] {
            orc.run_suite(id, Trigger::Manual)
                .unwrap()
                .wait()
                .await
                .unwrap();
        }

        match orc.stats(Some("solid"), 10) {
            Stats::Suite(rate) => assert_eq!(rate.rate, 1.0),
            other => panic!("unexpected {other:?}"),
        }
        match orc.stats(None, 10) {
            Stats::Overall(overall) => {
                assert_eq!(overall.total, 3);
                assert_eq!(overall.passed, 2);
                assert_eq!(overall.failed, 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        let health = orc.suite_health(10);
        assert_eq!(health.len(), 2);
        assert_eq!(health[0].success.rate, 0.0);
    }

    #[test]
    fn test_import_history() {
        let (orc, _) = orchestrator(ScriptedRunner::new());
        let mut done = TestExecution::queued(
            "old-run",
            "A",
            Trigger::Manual,
            crate::models::Environment::Development,
            0,
            chrono::Utc::now(),
        );
        done.status = ExecutionStatus::Completed;

        assert_eq!(orc.import_history(vec![done.clone(), done]), 1);
        assert_eq!(orc.history("A").len(), 1);
    }
}
