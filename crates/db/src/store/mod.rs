//! The persistence seam used by the execution core and the HTTP handlers.
//!
//! [`Store`] is implemented by [`PgStore`](postgres::PgStore) over the
//! repositories in [`crate::repositories`], and by
//! [`MemoryStore`](memory::MemoryStore), which keeps the same invariants
//! (pending-uniqueness, atomic claim, compare-and-set transitions,
//! restrict-on-runs deletes) in process memory.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use rftm_core::error::CoreError;
use rftm_core::pagination::PageRequest;
use rftm_core::types::{DbId, Timestamp};

use crate::models::queue_item::{NewQueueItem, QueueItem};
use crate::models::run_history::{NewRun, RunHistory, RunHistoryFilter, RunTransition};
use crate::models::run_log::RunLog;
use crate::models::test_case::{CreateTestCase, TestCase, TestCaseFilter, UpdateTestCase};
use crate::models::test_script::{CreateTestScript, TestScript, UpdateTestScript};

/// Name of the constraint guarding one pending queue item per (case, run).
pub const UQ_QUEUE_PENDING: &str = "uq_queue_items_pending_case_run";

/// Errors raised by a [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("Duplicate value violates unique constraint: {0}")]
    UniqueViolation(String),

    /// A referenced row is missing, or a row is still referenced.
    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    /// The backing database could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Any other database error.
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    /// Classify a sqlx error.
    ///
    /// - PostgreSQL `23505` (unique violation) -> [`StoreError::UniqueViolation`]
    /// - PostgreSQL `23503` (foreign key violation) -> [`StoreError::ForeignKeyViolation`]
    /// - PostgreSQL `42P01` (undefined table, schema not migrated yet) -> [`StoreError::Unavailable`]
    /// - pool timeouts, closed pools and I/O / TLS failures -> [`StoreError::Unavailable`]
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.into_owned());
                let constraint = db_err.constraint().map(str::to_string);
                classify_database_error(code.as_deref(), constraint, err)
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => Self::Unavailable(err.to_string()),
            _ => Self::Database(err),
        }
    }
}

fn classify_database_error(
    code: Option<&str>,
    constraint: Option<String>,
    err: sqlx::Error,
) -> StoreError {
    let constraint = || constraint.unwrap_or_else(|| "unknown".to_string());
    match code {
        Some("23505") => StoreError::UniqueViolation(constraint()),
        Some("23503") => StoreError::ForeignKeyViolation(constraint()),
        Some("42P01") => {
            StoreError::Unavailable(format!("Database schema is not migrated: {err}"))
        }
        _ => StoreError::Database(err),
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(constraint) => CoreError::Conflict(format!(
                "Duplicate value violates unique constraint: {constraint}"
            )),
            StoreError::ForeignKeyViolation(constraint) => CoreError::Conflict(format!(
                "Operation conflicts with related records ({constraint})"
            )),
            StoreError::Unavailable(msg) => CoreError::DependencyUnavailable(format!(
                "Database unavailable: {msg}"
            )),
            StoreError::Database(sqlx::Error::RowNotFound) => {
                CoreError::Internal("Expected row was not returned".into())
            }
            StoreError::Database(other) => CoreError::Internal(other.to_string()),
        }
    }
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

/// Transactional persistence for scripts, cases, queue items, runs and logs.
#[async_trait]
pub trait Store: Send + Sync {
    // --- Test scripts ---

    async fn create_script(&self, input: &CreateTestScript, created_by: &str)
        -> StoreResult<TestScript>;

    async fn get_script(&self, id: DbId) -> StoreResult<Option<TestScript>>;

    /// One page of scripts, newest first, plus the total count.
    async fn list_scripts(&self, page: PageRequest) -> StoreResult<(Vec<TestScript>, i64)>;

    async fn update_script(&self, id: DbId, input: &UpdateTestScript)
        -> StoreResult<Option<TestScript>>;

    /// Delete a script with its cases and their queue items.
    ///
    /// Fails with [`StoreError::ForeignKeyViolation`] if any case has runs.
    async fn delete_script(&self, id: DbId) -> StoreResult<bool>;

    async fn script_has_runs(&self, id: DbId) -> StoreResult<bool>;

    // --- Test cases ---

    /// Fails with [`StoreError::ForeignKeyViolation`] if the script is missing.
    async fn create_case(&self, input: &CreateTestCase) -> StoreResult<TestCase>;

    async fn get_case(&self, id: DbId) -> StoreResult<Option<TestCase>>;

    /// The subset of `ids` naming existing cases.
    async fn existing_case_ids(&self, ids: &[DbId]) -> StoreResult<Vec<DbId>>;

    async fn list_cases(&self, filter: &TestCaseFilter, page: PageRequest)
        -> StoreResult<(Vec<TestCase>, i64)>;

    async fn update_case(&self, id: DbId, input: &UpdateTestCase)
        -> StoreResult<Option<TestCase>>;

    /// Delete a case with its queue items. Refused if the case has runs.
    async fn delete_case(&self, id: DbId) -> StoreResult<bool>;

    async fn case_has_runs(&self, id: DbId) -> StoreResult<bool>;

    // --- Queue ---

    /// Insert a pending item; [`StoreError::UniqueViolation`] on a duplicate
    /// pending (case, run) pair.
    async fn insert_queue_item(&self, input: &NewQueueItem) -> StoreResult<QueueItem>;

    /// Claim the most urgent pending item, marking it removed atomically.
    async fn claim_next_queue_item(&self) -> StoreResult<Option<QueueItem>>;

    /// Mark all pending items of a case removed; returns how many changed.
    async fn remove_pending_queue_items(&self, case_id: DbId) -> StoreResult<u64>;

    /// Pending items ordered by (priority, enqueued_at, id).
    async fn list_pending_queue_items(&self) -> StoreResult<Vec<QueueItem>>;

    /// Delete removed items whose `removed_at` precedes `cutoff`.
    async fn purge_removed_queue_items(&self, cutoff: Timestamp) -> StoreResult<u64>;

    // --- Runs ---

    async fn insert_run(&self, input: &NewRun) -> StoreResult<RunHistory>;

    async fn get_run(&self, id: DbId) -> StoreResult<Option<RunHistory>>;

    /// One page of runs, ordered by `started_at DESC, id DESC`.
    async fn list_runs(&self, filter: &RunHistoryFilter, page: PageRequest)
        -> StoreResult<(Vec<RunHistory>, i64)>;

    /// Compare-and-set transition; `None` if the row is not in `from`.
    async fn transition_run(&self, transition: &RunTransition) -> StoreResult<Option<RunHistory>>;

    /// Runs that entered `running` before `cutoff` and are still running.
    async fn list_stale_running_runs(&self, cutoff: Timestamp) -> StoreResult<Vec<RunHistory>>;

    // --- Logs ---

    async fn get_run_log(&self, run_id: DbId) -> StoreResult<Option<RunLog>>;

    // --- Health ---

    async fn health_check(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn pool_timeout_is_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert_matches!(err, StoreError::Unavailable(_));
        assert_matches!(CoreError::from(err), CoreError::DependencyUnavailable(_));
    }

    #[test]
    fn unique_violation_is_conflict() {
        let err = StoreError::UniqueViolation(UQ_QUEUE_PENDING.into());
        assert_matches!(CoreError::from(err), CoreError::Conflict(msg) if msg.contains(UQ_QUEUE_PENDING));
    }

    #[test]
    fn foreign_key_violation_is_conflict() {
        let err = StoreError::ForeignKeyViolation("fk_run_history_test_case".into());
        assert_matches!(CoreError::from(err), CoreError::Conflict(_));
    }

    #[test]
    fn undefined_table_is_unavailable() {
        let err = classify_database_error(
            Some("42P01"),
            None,
            sqlx::Error::Protocol("relation \"test_scripts\" does not exist".into()),
        );
        assert_matches!(&err, StoreError::Unavailable(msg) if msg.contains("not migrated"));
        assert_matches!(CoreError::from(err), CoreError::DependencyUnavailable(_));
    }

    #[test]
    fn database_codes_are_classified() {
        let err = classify_database_error(
            Some("23505"),
            Some(UQ_QUEUE_PENDING.into()),
            sqlx::Error::RowNotFound,
        );
        assert_matches!(err, StoreError::UniqueViolation(c) if c == UQ_QUEUE_PENDING);

        let err = classify_database_error(Some("23503"), None, sqlx::Error::RowNotFound);
        assert_matches!(err, StoreError::ForeignKeyViolation(c) if c == "unknown");

        let err = classify_database_error(Some("22001"), None, sqlx::Error::RowNotFound);
        assert_matches!(err, StoreError::Database(_));
    }

    #[test]
    fn other_errors_are_internal() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert_matches!(CoreError::from(err), CoreError::Internal(_));
    }
}
