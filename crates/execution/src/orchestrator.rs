//! Execution orchestrator.
//!
//! Turns a batch of case ids into runs. Queued runs get a linked queue
//! item; immediate runs are driven to a terminal status in place:
//!
//! ```text
//! start -> mark_running -> runner -> upload log -> complete | fail
//! ```
//!
//! The whole batch is validated before anything is written.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rftm_core::error::CoreError;
use rftm_core::queue::validate_priority;
use rftm_core::run_status::{RunStatus, RunType};
use rftm_core::runner::{RunContext, RunOutcome, RunnerError, TestRunner};
use rftm_core::types::{Caller, DbId};
use rftm_db::models::run_history::RunHistory;
use rftm_db::models::run_log::NewRunLog;
use rftm_db::Store;
use rftm_storage::{log_key, ArtifactStore, LOG_CONTENT_TYPE};
use serde::Serialize;

use crate::history::RunHistoryTracker;
use crate::queue::QueueManager;

/// Per-case result of [`Orchestrator::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub run_id: DbId,
    pub case_id: DbId,
    pub status: RunStatus,
}

impl From<&RunHistory> for ExecutionResult {
    fn from(run: &RunHistory) -> Self {
        Self {
            run_id: run.id,
            case_id: run.case_id,
            status: run.status,
        }
    }
}

/// Default time budget for one runner invocation.
pub const DEFAULT_RUNNER_TIMEOUT: Duration = Duration::from_secs(3600);

pub struct Orchestrator {
    store: Arc<dyn Store>,
    artifacts: Arc<dyn ArtifactStore>,
    runner: Arc<dyn TestRunner>,
    runner_timeout: Duration,
    queue: QueueManager,
    history: RunHistoryTracker,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        artifacts: Arc<dyn ArtifactStore>,
        runner: Arc<dyn TestRunner>,
    ) -> Self {
        Self {
            queue: QueueManager::new(Arc::clone(&store)),
            history: RunHistoryTracker::new(Arc::clone(&store)),
            store,
            artifacts,
            runner,
            runner_timeout: DEFAULT_RUNNER_TIMEOUT,
        }
    }

    /// Fail runs whose runner does not return within `timeout`.
    pub fn with_runner_timeout(mut self, timeout: Duration) -> Self {
        self.runner_timeout = timeout;
        self
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub fn history(&self) -> &RunHistoryTracker {
        &self.history
    }

    /// Create one run per entry of `case_ids`, in order.
    ///
    /// Duplicate ids produce independent runs. `priority` only applies to
    /// queued runs.
    pub async fn execute(
        &self,
        case_ids: &[DbId],
        run_type: RunType,
        caller: &Caller,
        priority: Option<i32>,
    ) -> Result<Vec<ExecutionResult>, CoreError> {
        if case_ids.is_empty() {
            return Err(CoreError::Validation(
                "case_ids must contain at least one test case id".into(),
            ));
        }
        if let Some(p) = priority {
            validate_priority(p)?;
        }

        let existing = self.store.existing_case_ids(case_ids).await?;
        if let Some(&missing) = case_ids.iter().find(|&&id| !existing.contains(&id)) {
            return Err(CoreError::NotFound {
                entity: "TestCase",
                id: missing,
            });
        }

        tracing::info!(
            cases = case_ids.len(),
            run_type = %run_type,
            caller = %caller,
            "Executing test cases",
        );

        let mut results = Vec::with_capacity(case_ids.len());
        for &case_id in case_ids {
            let run = self.history.start(case_id, run_type, caller).await?;
            let run = match run_type {
                RunType::Queued => {
                    self.queue
                        .enqueue(case_id, priority, Some(run.id), caller)
                        .await?;
                    run
                }
                RunType::Immediate => self.drive_run(&run).await?,
            };
            results.push(ExecutionResult::from(&run));
        }
        Ok(results)
    }

    /// Drive a `pending` run to a terminal status.
    pub async fn drive_run(&self, run: &RunHistory) -> Result<RunHistory, CoreError> {
        let run = self.history.mark_running(run.id).await?;

        let ctx = match self.run_context(&run).await? {
            Some(ctx) => ctx,
            None => {
                return self
                    .history
                    .fail(run.id, "Test case or script no longer exists", None)
                    .await;
            }
        };

        let outcome = match self.invoke_runner(&ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(run_id = run.id, error = %e, "Runner error");
                return self.history.fail(run.id, &e.to_string(), None).await;
            }
        };

        let key = log_key(run.id);
        let stored = match self
            .artifacts
            .put(&key, outcome.log, LOG_CONTENT_TYPE)
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(run_id = run.id, key = %key, error = %e, "Log upload failed");
                return self
                    .history
                    .fail(run.id, &format!("Log upload failed: {e}"), None)
                    .await;
            }
        };
        let log = NewRunLog::new(stored.key)
            .with_content_type(LOG_CONTENT_TYPE)
            .with_size(stored.size_bytes);

        tracing::info!(
            run_id = run.id,
            passed = outcome.passed,
            duration_ms = outcome.duration.as_millis() as u64,
            "Runner finished",
        );

        if outcome.passed {
            self.history.complete(run.id, log).await
        } else {
            self.history.fail(run.id, &outcome.summary, Some(log)).await
        }
    }

    /// Claim one queue item and drive its run.
    ///
    /// Items enqueued directly carry no run; one is started here. A linked
    /// run that is no longer `pending` is reported as-is.
    pub async fn process_next(
        &self,
        caller: &Caller,
    ) -> Result<Option<ExecutionResult>, CoreError> {
        let Some(item) = self.queue.dequeue_next().await? else {
            return Ok(None);
        };

        let run = match item.run_id {
            Some(run_id) => self.history.get(run_id).await?,
            None => {
                self.history
                    .start(item.case_id, RunType::Queued, caller)
                    .await?
            }
        };

        if run.status != RunStatus::Pending {
            tracing::warn!(
                queue_item_id = item.id,
                run_id = run.id,
                status = %run.status,
                "Claimed queue item whose run already left pending",
            );
            return Ok(Some(ExecutionResult::from(&run)));
        }

        let finished = self.drive_run(&run).await?;
        Ok(Some(ExecutionResult::from(&finished)))
    }

    async fn invoke_runner(&self, ctx: &RunContext) -> Result<RunOutcome, RunnerError> {
        let started = Instant::now();
        match tokio::time::timeout(self.runner_timeout, self.runner.run(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(RunnerError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
        }
    }

    async fn run_context(&self, run: &RunHistory) -> Result<Option<RunContext>, CoreError> {
        let Some(case) = self.store.get_case(run.case_id).await? else {
            return Ok(None);
        };
        let Some(script) = self.store.get_script(case.test_script_id).await? else {
            return Ok(None);
        };
        Ok(Some(RunContext {
            run_id: run.id,
            case_id: case.id,
            case_name: case.name,
            script_id: script.id,
            script_name: script.name,
            script_content: script.content,
            variables: case.variables,
        }))
    }
}
