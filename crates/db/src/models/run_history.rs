//! Run history model (`run_history` table) and transition payloads.

use rftm_core::run_status::{RunStatus, RunType};
use rftm_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::run_log::NewRunLog;

/// A row from the `run_history` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunHistory {
    pub id: DbId,
    pub case_id: DbId,
    #[sqlx(try_from = "String")]
    pub run_type: RunType,
    #[sqlx(try_from = "String")]
    pub status: RunStatus,
    pub executor: String,
    pub started_at: Timestamp,
    /// Set when the run enters `running`.
    pub running_at: Option<Timestamp>,
    /// Set exactly once, when the run enters a terminal status.
    pub ended_at: Option<Timestamp>,
    pub failure_reason: Option<String>,
    pub created_at: Timestamp,
}

/// Insert payload for a new `pending` run.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub case_id: DbId,
    pub run_type: RunType,
    pub executor: String,
}

/// Filters for listing run history.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunHistoryFilter {
    pub case_id: Option<DbId>,
    pub status: Option<RunStatus>,
}

/// A compare-and-set status change.
///
/// Applied only if the row is still in `from`. Entering `running` stamps
/// `running_at`; entering a terminal status stamps `ended_at`, records the
/// failure reason and links the log in the same transaction.
#[derive(Debug, Clone)]
pub struct RunTransition {
    pub run_id: DbId,
    pub from: RunStatus,
    pub to: RunStatus,
    pub failure_reason: Option<String>,
    pub log: Option<NewRunLog>,
}

impl RunTransition {
    pub fn new(run_id: DbId, from: RunStatus, to: RunStatus) -> Self {
        Self {
            run_id,
            from,
            to,
            failure_reason: None,
            log: None,
        }
    }

    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn with_log(mut self, log: Option<NewRunLog>) -> Self {
        self.log = log;
        self
    }
}
