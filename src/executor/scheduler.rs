//! Suite and pipeline scheduling
//!
//! Drives executions through `queued -> running -> terminal`, respecting
//! dependency order, the `parallelizable` flag, fail-fast and cancellation.
//! A run is driven by one background task; each suite dispatch is a child
//! task that owns that suite's attempts, including retries.

use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Clock, DependencyResolver, RetryController, Runner};
use crate::config::SchedulerConfig;
use crate::error::{EntityKind, NotFoundError, OrchestratorError};
use crate::models::{
    verdict, Environment, ExecutionError, ExecutionStatus, FailureKind, NotificationTarget,
    PipelineConfig, ResultStatus, RunOptions, RunReport, RunTarget, SuiteOutcome, TestExecution,
    TestExecutionResult, TestSuite, Trigger,
};
use crate::notify::NotificationSink;
use crate::registry::SuiteRegistry;
use crate::results::ExecutionTracker;

/// Handle to an in-flight suite or pipeline run
#[derive(Debug)]
pub struct RunHandle {
    run_id: String,
    target: RunTarget,
    execution_ids: Vec<String>,
    join: JoinHandle<RunReport>,
}

/// Returned by `run_suite`
pub type ExecutionHandle = RunHandle;

/// Returned by `run_pipeline`
pub type PipelineRunHandle = RunHandle;

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn target(&self) -> &RunTarget {
        &self.target
    }

    /// Ids of the initial (attempt 0) execution records, in plan order
    pub fn execution_ids(&self) -> &[String] {
        &self.execution_ids
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the run to reach its final state
    pub async fn wait(self) -> Result<RunReport, JoinError> {
        self.join.await
    }
}

/// One suite of a run plan
#[derive(Clone, Debug)]
struct PlannedSuite {
    suite: TestSuite,
    /// `None` when the suite is bound to another environment
    environment: Option<Environment>,
    /// Plan indices of direct dependencies
    deps: Vec<usize>,
    execution_id: String,
}

/// Fully resolved run, built before the handle is returned
struct RunPlan {
    run_id: String,
    target: RunTarget,
    environment: Environment,
    trigger: Trigger,
    build_id: Option<String>,
    commit_hash: Option<String>,
    parallel: bool,
    fail_fast: bool,
    notifications: Vec<NotificationTarget>,
    suites: Vec<PlannedSuite>,
}

#[derive(Clone, Debug)]
enum Slot {
    Pending,
    Running,
    Done(SuiteOutcome),
}

enum Readiness {
    Ready,
    Blocked,
    DependencyFailed(String),
}

/// Everything a dispatched suite needs, owned
#[derive(Clone)]
struct SuiteJob {
    run_id: String,
    suite: TestSuite,
    environment: Environment,
    trigger: Trigger,
    build_id: Option<String>,
    commit_hash: Option<String>,
    execution_id: String,
    token: CancellationToken,
}

struct Inner {
    runner: Arc<dyn Runner>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn NotificationSink>,
    tracker: Arc<ExecutionTracker>,
    retry: RetryController,
    permits: Arc<Semaphore>,
    config: SchedulerConfig,
    runs: Mutex<HashMap<String, CancellationToken>>,
}

/// Orchestration core
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        runner: Arc<dyn Runner>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        tracker: Arc<ExecutionTracker>,
        config: SchedulerConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                runner,
                clock,
                sink,
                tracker,
                retry: RetryController::new(config.base_delay()),
                permits: Arc::new(Semaphore::new(max_concurrent)),
                config,
                runs: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn tracker(&self) -> &Arc<ExecutionTracker> {
        &self.inner.tracker
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Start a suite and its prerequisites.
    ///
    /// Dependencies run first, one at a time; the first one that does not
    /// complete skips everything after it, including the requested suite.
    pub fn run_suite(
        &self,
        suites: &SuiteRegistry,
        suite_id: &str,
        options: RunOptions,
    ) -> Result<ExecutionHandle, OrchestratorError> {
        let suite = suites.get(suite_id)?;
        let trigger = options.trigger.clone().unwrap_or(Trigger::Manual);
        if !suite.accepts(&trigger) {
            return Err(OrchestratorError::TriggerNotEnabled {
                suite: suite_id.to_string(),
                trigger: trigger.to_string(),
            });
        }

        let order = DependencyResolver::new(suites).resolve(suite_id)?;
        let environment = Environment::All
            .effective_for(suite.environment, self.inner.config.default_environment)
            .unwrap_or(self.inner.config.default_environment);

        let plan = self.plan(
            suites,
            order,
            RunTarget::Suite(suite_id.to_string()),
            environment,
            trigger,
            options,
            false,
            true,
            Vec::new(),
        )?;
        Ok(self.launch(plan))
    }

    /// Start a pipeline run
    pub fn run_pipeline(
        &self,
        suites: &SuiteRegistry,
        pipeline: &PipelineConfig,
        options: RunOptions,
    ) -> Result<PipelineRunHandle, OrchestratorError> {
        let order = DependencyResolver::new(suites).resolve_many(&pipeline.suites)?;
        let trigger = options.trigger.clone().unwrap_or(Trigger::Api);

        let plan = self.plan(
            suites,
            order,
            RunTarget::Pipeline(pipeline.id.clone()),
            pipeline.environment,
            trigger,
            options,
            pipeline.parallel,
            pipeline.fail_fast,
            pipeline.notifications.clone(),
        )?;
        Ok(self.launch(plan))
    }

    /// Cooperatively cancel a run, given its run id or the id of one of its executions.
    ///
    /// Queued executions are cancelled immediately; running ones finish.
    pub fn cancel(&self, id: &str) -> Result<(), NotFoundError> {
        let tracker = &self.inner.tracker;

        let run_id = if self.inner.runs.lock().contains_key(id) {
            id.to_string()
        } else if let Some(execution) = tracker.get(id) {
            execution.run_id
        } else if !tracker.for_run(id).is_empty() {
            // run already finished
            return Ok(());
        } else {
            return Err(NotFoundError::new(EntityKind::Run, id));
        };

        let token = self.inner.runs.lock().get(&run_id).cloned();
        if let Some(token) = token {
            token.cancel();
            let cancelled = tracker.cancel_queued(&run_id, self.inner.clock.now());
            info!(
                "Cancelled run {} ({} queued executions cancelled)",
                run_id,
                cancelled.len()
            );
        }
        Ok(())
    }

    /// Whether a run still has queued or running executions
    pub fn is_running(&self, run_id: &str) -> bool {
        !self.inner.tracker.active_for_run(run_id).is_empty()
    }

    #[allow(clippy::too_many_arguments)]
    fn plan(
        &self,
        suites: &SuiteRegistry,
        order: Vec<String>,
        target: RunTarget,
        environment: Environment,
        trigger: Trigger,
        options: RunOptions,
        parallel: bool,
        fail_fast: bool,
        notifications: Vec<NotificationTarget>,
    ) -> Result<RunPlan, OrchestratorError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let index: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut planned = Vec::with_capacity(order.len());
        for id in &order {
            let suite = suites.get(id)?.clone();
            let deps = suite
                .dependencies
                .iter()
                .filter_map(|dep| index.get(dep.as_str()).copied())
                .collect();
            let suite_env =
                environment.effective_for(suite.environment, self.inner.config.default_environment);

            planned.push(PlannedSuite {
                suite,
                environment: suite_env,
                deps,
                execution_id: String::new(),
            });
        }

        let now = self.inner.clock.now();
        let fallback = self.inner.config.default_environment;
        for slot in &mut planned {
            let execution = TestExecution::queued(
                run_id.as_str(),
                slot.suite.id.as_str(),
                trigger.clone(),
                slot.environment.unwrap_or(fallback),
                0,
                now,
            )
            .with_build(options.build_id.clone(), options.commit_hash.clone());
            slot.execution_id = execution.id.clone();
            // fresh id, cannot collide
            if let Err(e) = self.inner.tracker.record(execution) {
                error!("Failed to record queued execution: {}", e);
            }
        }

        Ok(RunPlan {
            run_id,
            target,
            environment,
            trigger,
            build_id: options.build_id,
            commit_hash: options.commit_hash,
            parallel,
            fail_fast,
            notifications,
            suites: planned,
        })
    }

    fn launch(&self, plan: RunPlan) -> RunHandle {
        let token = CancellationToken::new();
        self.inner
            .runs
            .lock()
            .insert(plan.run_id.clone(), token.clone());

        info!(
            "Starting run {} for {} ({} suites, parallel: {}, fail-fast: {})",
            plan.run_id,
            plan.target,
            plan.suites.len(),
            plan.parallel,
            plan.fail_fast
        );

        let run_id = plan.run_id.clone();
        let target = plan.target.clone();
        let execution_ids = plan.suites.iter().map(|s| s.execution_id.clone()).collect();
        let inner = self.inner.clone();
        let join = tokio::spawn(async move { inner.drive(plan, token).await });

        RunHandle {
            run_id,
            target,
            execution_ids,
            join,
        }
    }
}

impl Inner {
    async fn drive(self: Arc<Self>, plan: RunPlan, token: CancellationToken) -> RunReport {
        let started_at = self.clock.now();
        let limit = if plan.parallel {
            self.config.max_concurrent.max(1)
        } else {
            1
        };

        let mut slots = vec![Slot::Pending; plan.suites.len()];
        let mut tasks: JoinSet<(usize, SuiteOutcome)> = JoinSet::new();
        let mut running = 0usize;
        let mut exclusive = false;
        let mut halted = false;

        loop {
            let mut progressed = false;

            if !token.is_cancelled() && !halted {
                for i in dispatch_order(&plan) {
                    if !matches!(slots[i], Slot::Pending) {
                        continue;
                    }
                    let planned = &plan.suites[i];

                    if planned.environment.is_none() {
                        let error = ExecutionError::new(
                            FailureKind::Environment,
                            format!(
                                "suite targets {}, run targets {}",
                                planned.suite.environment, plan.environment
                            ),
                        );
                        slots[i] = Slot::Done(self.settle(
                            planned,
                            ExecutionStatus::Skipped,
                            Some(error),
                        ));
                        progressed = true;
                        continue;
                    }

                    match readiness(&plan, &slots, i) {
                        Readiness::Blocked => continue,
                        Readiness::DependencyFailed(dep) => {
                            let error = ExecutionError::new(
                                FailureKind::Dependency,
                                format!("dependency {dep} did not complete"),
                            );
                            slots[i] = Slot::Done(self.settle(
                                planned,
                                ExecutionStatus::Skipped,
                                Some(error),
                            ));
                            progressed = true;
                            continue;
                        }
                        Readiness::Ready => {}
                    }

                    let solo = plan.parallel && !planned.suite.parallelizable;
                    if running >= limit || exclusive || (solo && running > 0) {
                        // keep the blocked suite's place; later suites wait behind it
                        break;
                    }

                    debug!("Dispatching {} in run {}", planned.suite.id, plan.run_id);
                    let job = SuiteJob {
                        run_id: plan.run_id.clone(),
                        suite: planned.suite.clone(),
                        environment: planned
                            .environment
                            .unwrap_or(self.config.default_environment),
                        trigger: plan.trigger.clone(),
                        build_id: plan.build_id.clone(),
                        commit_hash: plan.commit_hash.clone(),
                        execution_id: planned.execution_id.clone(),
                        token: token.clone(),
                    };
                    let inner = self.clone();
                    tasks.spawn(async move {
                        let suite_id = job.suite.id.clone();
                        let execution_id = job.execution_id.clone();
                        let outcome = AssertUnwindSafe(inner.clone().execute_suite(job))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|panic| {
                                inner.panicked(&suite_id, &execution_id, panic.as_ref())
                            });
                        (i, outcome)
                    });

                    slots[i] = Slot::Running;
                    running += 1;
                    exclusive |= solo;
                    progressed = true;
                }
            }

            if tasks.is_empty() {
                let pending = slots.iter().any(|s| matches!(s, Slot::Pending));
                if !pending || token.is_cancelled() || halted || !progressed {
                    break;
                }
                continue;
            }

            match tasks.join_next().await {
                Some(Ok((i, outcome))) => {
                    running -= 1;
                    if !(plan.parallel && plan.suites[i].suite.parallelizable) {
                        exclusive = false;
                    }
                    if outcome.status == ExecutionStatus::Failed && plan.fail_fast && !halted {
                        warn!(
                            "Suite {} failed; fail-fast stops run {}",
                            outcome.suite_id, plan.run_id
                        );
                        halted = true;
                    }
                    slots[i] = Slot::Done(outcome);
                }
                Some(Err(e)) => {
                    error!("Suite task in run {} aborted: {}", plan.run_id, e);
                    running = running.saturating_sub(1);
                    exclusive = false;
                }
                None => {}
            }
        }

        let cancelled = token.is_cancelled();
        let mut outcomes: Vec<SuiteOutcome> = Vec::with_capacity(slots.len());
        for (i, slot) in slots.into_iter().enumerate() {
            let planned = &plan.suites[i];
            let outcome = match slot {
                Slot::Done(outcome) => outcome,
                Slot::Pending if cancelled => {
                    self.settle(planned, ExecutionStatus::Cancelled, None)
                }
                Slot::Pending => {
                    // dependencies always precede their dependents in the plan
                    let failed_dep = planned.deps.iter().find_map(|&d| {
                        outcomes
                            .get(d)
                            .filter(|o| o.status != ExecutionStatus::Completed)
                            .map(|o| o.suite_id.clone())
                    });
                    let error = match failed_dep {
                        Some(dep) => ExecutionError::new(
                            FailureKind::Dependency,
                            format!("dependency {dep} did not complete"),
                        ),
                        None => ExecutionError::new(
                            FailureKind::FailFast,
                            "not started after an earlier failure",
                        ),
                    };
                    self.settle(planned, ExecutionStatus::Skipped, Some(error))
                }
                // task aborted without reporting
                Slot::Running => self.settle_running(&plan.run_id, planned),
            };
            outcomes.push(outcome);
        }

        self.runs.lock().remove(&plan.run_id);

        let report = RunReport {
            status: RunReport::summarize(cancelled, &outcomes),
            run_id: plan.run_id.clone(),
            target: plan.target.clone(),
            environment: plan.environment,
            started_at,
            finished_at: self.clock.now(),
            suites: outcomes,
            notifications: plan.notifications.clone(),
        };

        info!(
            "Run {} for {} finished: {} in {}ms",
            report.run_id,
            report.target,
            report.status,
            report.duration_ms()
        );

        if matches!(report.target, RunTarget::Pipeline(_)) {
            self.sink.notify(&report).await;
        }

        report
    }

    /// Run one suite to its final attempt
    async fn execute_suite(self: Arc<Self>, job: SuiteJob) -> SuiteOutcome {
        let mut attempt = 0u32;
        let mut execution_id = job.execution_id.clone();

        loop {
            let status = self.execute_attempt(&job, &execution_id, attempt).await;

            let retry = status == ExecutionStatus::Failed
                && !job.token.is_cancelled()
                && self
                    .tracker
                    .get(&execution_id)
                    .map(|record| self.retry.should_retry(&job.suite, &record))
                    .unwrap_or(false);

            if !retry {
                return SuiteOutcome {
                    suite_id: job.suite.id.clone(),
                    status,
                    attempts: attempt + 1,
                    execution_id,
                };
            }

            let delay = self.retry.next_delay(&job.suite, attempt);
            warn!(
                "Suite {} failed on attempt {}; retrying in {}ms",
                job.suite.id,
                attempt,
                delay.as_millis()
            );

            tokio::select! {
                _ = self.clock.sleep(delay) => {}
                _ = job.token.cancelled() => {
                    return SuiteOutcome {
                        suite_id: job.suite.id.clone(),
                        status,
                        attempts: attempt + 1,
                        execution_id,
                    };
                }
            }

            attempt += 1;
            let next = TestExecution::queued(
                job.run_id.as_str(),
                job.suite.id.as_str(),
                job.trigger.clone(),
                job.environment,
                attempt,
                self.clock.now(),
            )
            .with_build(job.build_id.clone(), job.commit_hash.clone());
            execution_id = next.id.clone();
            if let Err(e) = self.tracker.record(next) {
                error!("Failed to record retry of {}: {}", job.suite.id, e);
            }
        }
    }

    /// One runner invocation for one execution record
    async fn execute_attempt(
        &self,
        job: &SuiteJob,
        execution_id: &str,
        attempt: u32,
    ) -> ExecutionStatus {
        let permit = tokio::select! {
            biased;
            _ = job.token.cancelled() => None,
            permit = self.permits.clone().acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            return self.settle_id(execution_id, ExecutionStatus::Cancelled, Vec::new(), None);
        };

        if let Err(e) = self.tracker.start(execution_id, self.clock.now()) {
            debug!("Not starting {}: {}", execution_id, e);
            return self.current_status(execution_id, ExecutionStatus::Cancelled);
        }

        info!(
            "Running {} (attempt {}, {})",
            job.suite.id, attempt, job.environment
        );

        let invocation = AssertUnwindSafe(self.runner.invoke(
            &job.suite.id,
            job.environment,
            attempt,
        ))
        .catch_unwind();

        let timeout = job
            .suite
            .timeout_secs
            .map(Duration::from_secs)
            .or_else(|| self.config.suite_timeout());

        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, invocation).await.ok(),
            None => Some(invocation.await),
        };

        let (status, results, error) = match outcome {
            None => (
                ExecutionStatus::Failed,
                Vec::new(),
                Some(ExecutionError::new(
                    FailureKind::Timeout,
                    format!("no result within {}s", timeout.unwrap_or_default().as_secs()),
                )),
            ),
            Some(Err(panic)) => (
                ExecutionStatus::Failed,
                Vec::new(),
                Some(ExecutionError::new(
                    FailureKind::Panicked,
                    panic_message(panic.as_ref()),
                )),
            ),
            Some(Ok(Err(e))) => {
                error!("Runner failed for {}: {}", job.suite.id, e);
                (
                    ExecutionStatus::Failed,
                    Vec::new(),
                    Some(ExecutionError::new(FailureKind::Harness, e.to_string())),
                )
            }
            Some(Ok(Ok(results))) => {
                let status = verdict(&results);
                let error = (status == ExecutionStatus::Failed).then(|| {
                    let not_passed = results.len()
                        - results
                            .iter()
                            .filter(|r| r.status == ResultStatus::Pass)
                            .count();
                    ExecutionError::new(
                        FailureKind::TestFailure,
                        format!("{} of {} tests did not pass", not_passed, results.len()),
                    )
                });
                (status, results, error)
            }
        };

        let status = self.settle_id(execution_id, status, results, error);
        info!("{} attempt {} {}", job.suite.id, attempt, status);
        status
    }

    /// Move a pending plan entry to a terminal status
    fn settle(
        &self,
        planned: &PlannedSuite,
        status: ExecutionStatus,
        error: Option<ExecutionError>,
    ) -> SuiteOutcome {
        if let Some(error) = &error {
            warn!("Skipping {}: {}", planned.suite.id, error.message);
        }
        let status = self.settle_id(&planned.execution_id, status, Vec::new(), error);
        SuiteOutcome {
            suite_id: planned.suite.id.clone(),
            status,
            attempts: 1,
            execution_id: planned.execution_id.clone(),
        }
    }

    /// Finish a record; if it is already terminal, report what it ended as
    fn settle_id(
        &self,
        execution_id: &str,
        status: ExecutionStatus,
        results: Vec<TestExecutionResult>,
        error: Option<ExecutionError>,
    ) -> ExecutionStatus {
        match self
            .tracker
            .finish(execution_id, status, results, error, self.clock.now())
        {
            Ok(record) => record.status,
            Err(e) => {
                debug!("Execution {} not updated: {}", execution_id, e);
                self.current_status(execution_id, status)
            }
        }
    }

    fn settle_running(&self, run_id: &str, planned: &PlannedSuite) -> SuiteOutcome {
        let execution_id = self
            .tracker
            .active_for_run(run_id)
            .into_iter()
            .find(|e| e.suite_id == planned.suite.id)
            .map(|e| e.id)
            .unwrap_or_else(|| planned.execution_id.clone());

        let status = self.settle_id(
            &execution_id,
            ExecutionStatus::Failed,
            Vec::new(),
            Some(ExecutionError::new(
                FailureKind::Panicked,
                "suite task ended without a result",
            )),
        );
        SuiteOutcome {
            suite_id: planned.suite.id.clone(),
            status,
            attempts: 1,
            execution_id,
        }
    }

    fn panicked(
        &self,
        suite_id: &str,
        execution_id: &str,
        panic: &(dyn Any + Send),
    ) -> SuiteOutcome {
        let message = panic_message(panic);
        error!("Suite task for {} panicked: {}", suite_id, message);
        let status = self.settle_id(
            execution_id,
            ExecutionStatus::Failed,
            Vec::new(),
            Some(ExecutionError::new(FailureKind::Panicked, message)),
        );
        SuiteOutcome {
            suite_id: suite_id.to_string(),
            status,
            attempts: 1,
            execution_id: execution_id.to_string(),
        }
    }

    fn current_status(&self, execution_id: &str, fallback: ExecutionStatus) -> ExecutionStatus {
        self.tracker
            .get(execution_id)
            .map(|e| e.status)
            .unwrap_or(fallback)
    }
}

/// Plan order; in parallel mode higher priority goes first, ties keep plan order
fn dispatch_order(plan: &RunPlan) -> Vec<usize> {
    let mut order: Vec<usize> = (0..plan.suites.len()).collect();
    if plan.parallel {
        order.sort_by_key(|&i| (plan.suites[i].suite.priority, i));
    }
    order
}

fn readiness(plan: &RunPlan, slots: &[Slot], i: usize) -> Readiness {
    for &dep in &plan.suites[i].deps {
        match slots.get(dep) {
            Some(Slot::Done(outcome)) if outcome.status == ExecutionStatus::Completed => {}
            Some(Slot::Done(outcome)) => {
                return Readiness::DependencyFailed(outcome.suite_id.clone())
            }
            _ => return Readiness::Blocked,
        }
    }
    Readiness::Ready
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "runner panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{
        max_overlap, overlaps, ManualClock, RecordingSink, ScriptedRunner, Step,
    };
    use crate::models::{Priority, RunStatus, SuiteType};

    struct Fixture {
        scheduler: Scheduler,
        runner: Arc<ScriptedRunner>,
        clock: Arc<ManualClock>,
        sink: RecordingSink,
        tracker: Arc<ExecutionTracker>,
        suites: SuiteRegistry,
    }

    fn fixture(runner: ScriptedRunner, suites: Vec<TestSuite>) -> Fixture {
        fixture_with(runner, suites, SchedulerConfig::default())
    }

    fn fixture_with(
        runner: ScriptedRunner,
        suites: Vec<TestSuite>,
        mut config: SchedulerConfig,
    ) -> Fixture {
        config.base_delay_ms = 100;
        let runner = Arc::new(runner);
        let clock = Arc::new(ManualClock::new());
        let sink = RecordingSink::default();
        let tracker = Arc::new(ExecutionTracker::default());

        let mut registry = SuiteRegistry::new();
        for suite in suites {
            registry.register(suite).unwrap();
        }

        Fixture {
            scheduler: Scheduler::new(
                runner.clone(),
                clock.clone(),
                Arc::new(sink.clone()),
                tracker.clone(),
                config,
            ),
            runner,
            clock,
            sink,
            tracker,
            suites: registry,
        }
    }

    fn suite(id: &str) -> TestSuite {
        TestSuite::new(id, SuiteType::Integration)
    }

    async fn run(f: &Fixture, pipeline: &PipelineConfig) -> RunReport {
        f.scheduler
            .run_pipeline(&f.suites, pipeline, RunOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap()
    }

    fn status_of(f: &Fixture, suite_id: &str) -> Vec<ExecutionStatus> {
        let mut history = f.tracker.history(suite_id);
        history.reverse();
        history.into_iter().map(|e| e.status).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_pipeline_completes() {
        let f = fixture(
            ScriptedRunner::new(),
            vec![suite("A"), suite("B").depends_on("A")],
        );
        let pipeline = PipelineConfig::new("ci", vec!["A", "B"]).fail_fast(true);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(status_of(&f, "A"), vec![ExecutionStatus::Completed]);
        assert_eq!(status_of(&f, "B"), vec![ExecutionStatus::Completed]);
        assert_eq!(f.sink.reports().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_dependency_skips_dependent() {
        let f = fixture(
            ScriptedRunner::new().script("A", &[Step::Fail]),
            vec![suite("A"), suite("B").depends_on("A")],
        );
        let pipeline = PipelineConfig::new("ci", vec!["A", "B"]).fail_fast(true);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(status_of(&f, "A"), vec![ExecutionStatus::Failed]);
        assert_eq!(status_of(&f, "B"), vec![ExecutionStatus::Skipped]);
        assert_eq!(report.outcome("A").unwrap().attempts, 1);
        assert!(f.runner.calls_for("B").is_empty());

        let skipped = &f.tracker.history("B")[0];
        assert_eq!(
            skipped.error.as_ref().map(|e| e.kind),
            Some(FailureKind::Dependency)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_backoff() {
        let f = fixture(
            ScriptedRunner::new().script("C", &[Step::Fail, Step::Fail, Step::Pass]),
            vec![suite("C").with_retry(2, 2.0)],
        );

        let report = f
            .scheduler
            .run_suite(&f.suites, "C", RunOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(
            status_of(&f, "C"),
            vec![
                ExecutionStatus::Failed,
                ExecutionStatus::Failed,
                ExecutionStatus::Completed
            ]
        );
        assert_eq!(report.outcome("C").unwrap().attempts, 3);
        assert_eq!(
            f.clock.sleeps(),
            vec![Duration::from_millis(100), Duration::from_millis(200)]
        );

        let attempts: Vec<u32> = f.runner.calls_for("C").iter().map(|c| c.attempt).collect();
        assert_eq!(attempts, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_suites_overlap() {
        let f = fixture(
            ScriptedRunner::new(),
            vec![suite("D").parallelizable(true), suite("E").parallelizable(true)],
        );
        let pipeline = PipelineConfig::new("ci", vec!["D", "E"]).parallel(true);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Completed);
        let d = &f.runner.calls_for("D")[0];
        let e = &f.runner.calls_for("E")[0];
        assert!(overlaps(d, e));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_suites_do_not_overlap() {
        let f = fixture(
            ScriptedRunner::new(),
            vec![suite("D").parallelizable(true), suite("E").parallelizable(true)],
        );
        let pipeline = PipelineConfig::new("ci", vec!["D", "E"]);

        run(&f, &pipeline).await;

        assert_eq!(max_overlap(&f.runner.calls()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_skips_remaining() {
        let f = fixture(
            ScriptedRunner::new().script("A", &[Step::Fail]),
            vec![suite("A"), suite("B"), suite("C")],
        );
        let pipeline = PipelineConfig::new("ci", vec!["A", "B", "C"]).fail_fast(true);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Failed);
        for id in ["B", "C"] {
            let history = f.tracker.history(id);
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].status, ExecutionStatus::Skipped);
            assert!(history[0].start_time.is_none());
            assert_eq!(
                history[0].error.as_ref().map(|e| e.kind),
                Some(FailureKind::FailFast)
            );
        }
        assert_eq!(f.runner.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parallel_fail_fast_lets_running_finish() {
        let config = SchedulerConfig {
            max_concurrent: 2,
            ..SchedulerConfig::default()
        };
        let runner = ScriptedRunner::new()
            .script("A", &[Step::Fail])
            .delay("A", Duration::from_millis(1))
            .delay("B", Duration::from_millis(50));
        let suites = ["A", "B", "C", "D"]
            .iter()
            .map(|id| suite(id).parallelizable(true))
            .collect();
        let f = fixture_with(runner, suites, config);
        let pipeline = PipelineConfig::new("ci", vec!["A", "B", "C", "D"])
            .parallel(true)
            .fail_fast(true);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(status_of(&f, "A"), vec![ExecutionStatus::Failed]);
        assert_eq!(status_of(&f, "B"), vec![ExecutionStatus::Completed]);
        assert_eq!(f.runner.calls_for("B").len(), 1);
        for id in ["C", "D"] {
            let history = f.tracker.history(id);
            assert_eq!(history.len(), 1);
            assert_eq!(history[0].status, ExecutionStatus::Skipped);
            assert_eq!(
                history[0].error.as_ref().map(|e| e.kind),
                Some(FailureKind::FailFast)
            );
            assert!(f.runner.calls_for(id).is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_fail_fast_independent_suites_run() {
        let f = fixture(
            ScriptedRunner::new().script("A", &[Step::Fail]),
            vec![suite("A"), suite("B"), suite("C").depends_on("A")],
        );
        let pipeline = PipelineConfig::new("ci", vec!["A", "B", "C"]).fail_fast(false);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(status_of(&f, "B"), vec![ExecutionStatus::Completed]);
        assert_eq!(status_of(&f, "C"), vec![ExecutionStatus::Skipped]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound() {
        let f = fixture(
            ScriptedRunner::new().script("A", &[Step::Fail]),
            vec![suite("A").with_retry(3, 1.0)],
        );
        let pipeline = PipelineConfig::new("ci", vec!["A"]);

        let report = run(&f, &pipeline).await;

        let history = f.tracker.history("A");
        assert_eq!(history.len(), 4);
        assert!(history.iter().all(|e| e.status == ExecutionStatus::Failed));
        assert_eq!(report.outcome("A").unwrap().attempts, 4);
        assert_eq!(f.clock.sleeps(), vec![Duration::from_millis(100); 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependencies_finish_before_dependents_start() {
        let f = fixture(
            ScriptedRunner::new(),
            vec![
                suite("db").parallelizable(true),
                suite("api").depends_on("db").parallelizable(true),
                suite("ui").depends_on("api").parallelizable(true),
                suite("lint").parallelizable(true),
            ],
        );
        let pipeline = PipelineConfig::new("ci", vec!["ui", "lint"]).parallel(true);

        let report = run(&f, &pipeline).await;
        assert_eq!(report.status, RunStatus::Completed);

        for suite in f.suites.list_all() {
            let exec = &f.tracker.history(&suite.id)[0];
            for dep in &suite.dependencies {
                let dep_exec = &f.tracker.history(dep)[0];
                assert!(dep_exec.start_time <= exec.start_time);
                assert!(dep_exec.end_time <= exec.start_time);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_dispatch_order() {
        let config = SchedulerConfig {
            max_concurrent: 1,
            ..SchedulerConfig::default()
        };
        let f = fixture_with(
            ScriptedRunner::new(),
            vec![
                suite("low").with_priority(Priority::Low).parallelizable(true),
                suite("critical")
                    .with_priority(Priority::Critical)
                    .parallelizable(true),
            ],
            config,
        );
        let pipeline = PipelineConfig::new("ci", vec!["low", "critical"]).parallel(true);

        run(&f, &pipeline).await;

        let order: Vec<String> = f.runner.calls().into_iter().map(|c| c.suite_id).collect();
        assert_eq!(order, vec!["critical", "low"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_parallelizable_runs_alone() {
        let f = fixture(
            ScriptedRunner::new(),
            vec![
                suite("x").parallelizable(true),
                suite("migrate"),
                suite("z").parallelizable(true),
            ],
        );
        let pipeline = PipelineConfig::new("ci", vec!["x", "migrate", "z"]).parallel(true);

        run(&f, &pipeline).await;

        let migrate = &f.runner.calls_for("migrate")[0];
        for other in ["x", "z"] {
            assert!(!overlaps(migrate, &f.runner.calls_for(other)[0]));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_concurrency_limit() {
        let config = SchedulerConfig {
            max_concurrent: 2,
            ..SchedulerConfig::default()
        };
        let suites: Vec<TestSuite> = (0..5)
            .map(|i| suite(&format!("s{i}")).parallelizable(true))
            .collect();
        let f = fixture_with(ScriptedRunner::new(), suites, config);
        let pipeline =
            PipelineConfig::new("ci", vec!["s0", "s1", "s2", "s3", "s4"]).parallel(true);

        run(&f, &pipeline).await;

        assert_eq!(f.runner.calls().len(), 5);
        assert_eq!(max_overlap(&f.runner.calls()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cancels_queued() {
        let f = fixture(
            ScriptedRunner::new().script("slow", &[Step::Hang]),
            vec![suite("slow"), suite("after")],
        );
        let pipeline = PipelineConfig::new("ci", vec!["slow", "after"]);

        let handle = f
            .scheduler
            .run_pipeline(&f.suites, &pipeline, RunOptions::default())
            .unwrap();
        let run_id = handle.run_id().to_string();

        while f.tracker.history("slow")[0].status != ExecutionStatus::Running {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(f.scheduler.is_running(&run_id));
        f.scheduler.cancel(&run_id).unwrap();
        assert_eq!(status_of(&f, "after"), vec![ExecutionStatus::Cancelled]);

        let report = handle.wait().await.unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
        // the in-flight suite is allowed to finish
        assert_eq!(status_of(&f, "slow"), vec![ExecutionStatus::Completed]);
        assert_eq!(status_of(&f, "after"), vec![ExecutionStatus::Cancelled]);
        assert!(f.runner.calls_for("after").is_empty());
        assert!(!f.scheduler.is_running(&run_id));

        // finished runs accept cancel as a no-op
        assert!(f.scheduler.cancel(&run_id).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_unknown_id() {
        let f = fixture(ScriptedRunner::new(), vec![suite("A")]);
        assert!(f.scheduler.cancel("no-such-run").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_harness_error_is_failure() {
        let f = fixture(
            ScriptedRunner::new().script("A", &[Step::HarnessError]),
            vec![suite("A")],
        );

        let report = f
            .scheduler
            .run_suite(&f.suites, "A", RunOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Failed);
        let exec = &f.tracker.history("A")[0];
        assert_eq!(exec.error.as_ref().map(|e| e.kind), Some(FailureKind::Harness));
        assert!(exec.results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_suite_timeout() {
        let f = fixture(
            ScriptedRunner::new().script("A", &[Step::Hang]),
            vec![suite("A").with_timeout(30)],
        );
        let pipeline = PipelineConfig::new("ci", vec!["A"]);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Failed);
        let exec = &f.tracker.history("A")[0];
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.error.as_ref().map(|e| e.kind), Some(FailureKind::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_runner_is_isolated() {
        let f = fixture(
            ScriptedRunner::new().script("boom", &[Step::Panic]),
            vec![suite("boom").parallelizable(true), suite("fine").parallelizable(true)],
        );
        let pipeline = PipelineConfig::new("ci", vec!["boom", "fine"])
            .parallel(true)
            .fail_fast(false);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Failed);
        let exec = &f.tracker.history("boom")[0];
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.error.as_ref().map(|e| e.kind), Some(FailureKind::Panicked));
        assert_eq!(status_of(&f, "fine"), vec![ExecutionStatus::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_environment_mismatch_skips() {
        let f = fixture(
            ScriptedRunner::new(),
            vec![
                suite("prod-only").with_environment(Environment::Production),
                suite("anywhere"),
            ],
        );
        let pipeline = PipelineConfig::new("ci", vec!["prod-only", "anywhere"])
            .with_environment(Environment::Staging)
            .fail_fast(false);

        let report = run(&f, &pipeline).await;

        assert_eq!(report.status, RunStatus::Failed);
        let skipped = &f.tracker.history("prod-only")[0];
        assert_eq!(skipped.status, ExecutionStatus::Skipped);
        assert_eq!(
            skipped.error.as_ref().map(|e| e.kind),
            Some(FailureKind::Environment)
        );
        let ran = &f.runner.calls_for("anywhere")[0];
        assert_eq!(ran.environment, Environment::Staging);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suite_run_uses_its_own_environment() {
        let f = fixture(
            ScriptedRunner::new(),
            vec![suite("A").with_environment(Environment::Production)],
        );

        let report = f
            .scheduler
            .run_suite(&f.suites, "A", RunOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(report.environment, Environment::Production);
        assert_eq!(f.runner.calls()[0].environment, Environment::Production);
        // suite runs do not notify
        assert!(f.sink.reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_not_enabled() {
        let f = fixture(
            ScriptedRunner::new(),
            vec![suite("A").with_trigger(Trigger::Webhook)],
        );

        let err = f
            .scheduler
            .run_suite(&f.suites, "A", RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::TriggerNotEnabled { .. }));

        let ok = f.scheduler.run_suite(
            &f.suites,
            "A",
            RunOptions::default().trigger(Trigger::Webhook),
        );
        assert!(ok.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_metadata_recorded() {
        let f = fixture(ScriptedRunner::new(), vec![suite("A")]);
        let pipeline = PipelineConfig::new("ci", vec!["A"]);

        let handle = f
            .scheduler
            .run_pipeline(
                &f.suites,
                &pipeline,
                RunOptions::default().build("build-42").commit("abc123"),
            )
            .unwrap();

        // queued records exist before the handle is awaited
        let queued = f.tracker.get(&handle.execution_ids()[0]).unwrap();
        assert_eq!(queued.build_id.as_deref(), Some("build-42"));
        assert_eq!(queued.trigger, Trigger::Api);

        handle.wait().await.unwrap();
        let exec = &f.tracker.history("A")[0];
        assert_eq!(exec.commit_hash.as_deref(), Some("abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_suite_in_pipeline() {
        let f = fixture(ScriptedRunner::new(), vec![suite("A")]);
        let pipeline = PipelineConfig::new("ci", vec!["A", "ghost"]);

        let err = f
            .scheduler
            .run_pipeline(&f.suites, &pipeline, RunOptions::default())
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Resolve(_)));
        assert!(f.tracker.is_empty());
    }
}
