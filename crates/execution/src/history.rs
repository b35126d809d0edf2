//! Run history tracker.
//!
//! Owns every [`RunHistory`] transition after creation. Each transition is
//! checked against the state machine in [`RunStatus`] and then applied as a
//! compare-and-set on the status read beforehand:
//!
//! - unknown run -> [`CoreError::NotFound`]
//! - transition not allowed from the current status -> [`CoreError::InvalidState`]
//! - status changed between read and write -> [`CoreError::Conflict`]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rftm_core::error::CoreError;
use rftm_core::pagination::{Page, PageRequest};
use rftm_core::run_status::{RunStatus, RunType};
use rftm_core::types::{Caller, DbId};
use rftm_db::models::run_history::{NewRun, RunHistory, RunHistoryFilter, RunTransition};
use rftm_db::models::run_log::{NewRunLog, RunLog};
use rftm_db::{Store, StoreError};

/// Failure reason recorded by [`RunHistoryTracker::expire_stale`].
pub const TIMEOUT_REASON: &str = "timeout";

#[derive(Clone)]
pub struct RunHistoryTracker {
    store: Arc<dyn Store>,
}

impl RunHistoryTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a `pending` run for `case_id`.
    pub async fn start(
        &self,
        case_id: DbId,
        run_type: RunType,
        caller: &Caller,
    ) -> Result<RunHistory, CoreError> {
        let not_found = || CoreError::NotFound {
            entity: "TestCase",
            id: case_id,
        };
        if self.store.get_case(case_id).await?.is_none() {
            return Err(not_found());
        }

        let input = NewRun {
            case_id,
            run_type,
            executor: caller.as_str().to_string(),
        };
        let run = match self.store.insert_run(&input).await {
            Ok(run) => run,
            Err(StoreError::ForeignKeyViolation(_)) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(run_id = run.id, case_id, run_type = %run_type, "Run created");
        Ok(run)
    }

    /// `pending -> running`.
    pub async fn mark_running(&self, run_id: DbId) -> Result<RunHistory, CoreError> {
        self.transition(run_id, RunStatus::Running, None, None).await
    }

    /// `running -> completed`, linking the run's log.
    pub async fn complete(&self, run_id: DbId, log: NewRunLog) -> Result<RunHistory, CoreError> {
        self.transition(run_id, RunStatus::Completed, None, Some(log))
            .await
    }

    /// `running -> failed` with a reason and an optional log.
    pub async fn fail(
        &self,
        run_id: DbId,
        reason: &str,
        log: Option<NewRunLog>,
    ) -> Result<RunHistory, CoreError> {
        self.transition(run_id, RunStatus::Failed, Some(reason.to_string()), log)
            .await
    }

    pub async fn get(&self, run_id: DbId) -> Result<RunHistory, CoreError> {
        self.store
            .get_run(run_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "RunHistory",
                id: run_id,
            })
    }

    /// The log linked to `run_id`, if any.
    pub async fn log(&self, run_id: DbId) -> Result<Option<RunLog>, CoreError> {
        Ok(self.store.get_run_log(run_id).await?)
    }

    /// One page of runs, most recent first.
    pub async fn list(
        &self,
        filter: &RunHistoryFilter,
        page: PageRequest,
    ) -> Result<Page<RunHistory>, CoreError> {
        let (items, total) = self.store.list_runs(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    /// Fail every run that has been `running` for longer than `timeout`.
    ///
    /// Runs that finish concurrently are skipped rather than reported.
    pub async fn expire_stale(&self, timeout: Duration) -> Result<Vec<RunHistory>, CoreError> {
        let timeout = chrono::Duration::from_std(timeout)
            .map_err(|e| CoreError::Validation(format!("Run timeout out of range: {e}")))?;
        let cutoff = Utc::now() - timeout;

        let mut expired = Vec::new();
        for run in self.store.list_stale_running_runs(cutoff).await? {
            let transition = RunTransition::new(run.id, RunStatus::Running, RunStatus::Failed)
                .with_failure_reason(TIMEOUT_REASON);
            match self.store.transition_run(&transition).await? {
                Some(updated) => {
                    tracing::warn!(
                        run_id = updated.id,
                        case_id = updated.case_id,
                        running_at = ?updated.running_at,
                        "Run exceeded timeout and was failed",
                    );
                    expired.push(updated);
                }
                None => {
                    tracing::debug!(run_id = run.id, "Stale run finished before expiry");
                }
            }
        }
        Ok(expired)
    }

    async fn transition(
        &self,
        run_id: DbId,
        to: RunStatus,
        reason: Option<String>,
        log: Option<NewRunLog>,
    ) -> Result<RunHistory, CoreError> {
        let current = self.get(run_id).await?;
        current.status.ensure_transition(to)?;

        let mut transition = RunTransition::new(run_id, current.status, to).with_log(log);
        if let Some(reason) = reason {
            transition = transition.with_failure_reason(reason);
        }

        match self.store.transition_run(&transition).await? {
            Some(updated) => {
                tracing::info!(
                    run_id,
                    from = %current.status,
                    to = %to,
                    failure_reason = ?updated.failure_reason,
                    "Run transitioned",
                );
                Ok(updated)
            }
            None => Err(CoreError::Conflict(format!(
                "Run {run_id} changed state concurrently; expected '{}'",
                current.status
            ))),
        }
    }
}
