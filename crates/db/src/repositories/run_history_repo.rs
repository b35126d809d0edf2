//! Repository for the `run_history` table.
//!
//! Status changes go exclusively through [`RunHistoryRepo::transition`],
//! a compare-and-set on the expected current status. Legality of the
//! transition itself is checked by the caller against
//! [`RunStatus::can_transition_to`](rftm_core::run_status::RunStatus::can_transition_to).

use rftm_core::pagination::PageRequest;
use rftm_core::run_status::RunStatus;
use rftm_core::types::{DbId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::run_history::{NewRun, RunHistory, RunHistoryFilter, RunTransition};

/// Column list for `run_history` queries.
const COLUMNS: &str = "\
    id, case_id, run_type, status, executor, \
    started_at, running_at, ended_at, failure_reason, created_at";

/// Provides creation, guarded transitions and listing for runs.
pub struct RunHistoryRepo;

impl RunHistoryRepo {
    /// Create a new `pending` run with `started_at = NOW()`.
    pub async fn create(pool: &PgPool, input: &NewRun) -> Result<RunHistory, sqlx::Error> {
        let query = format!(
            "INSERT INTO run_history (case_id, run_type, status, executor)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunHistory>(&query)
            .bind(input.case_id)
            .bind(input.run_type.as_str())
            .bind(RunStatus::Pending.as_str())
            .bind(&input.executor)
            .fetch_one(pool)
            .await
    }

    /// Find a run by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<RunHistory>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM run_history WHERE id = $1");
        sqlx::query_as::<_, RunHistory>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply `transition` if the row is still in `transition.from`.
    ///
    /// Returns `None` when the row is missing or has moved on; the caller
    /// re-reads to tell the two apart.
    pub async fn transition<'e>(
        executor: impl PgExecutor<'e>,
        transition: &RunTransition,
    ) -> Result<Option<RunHistory>, sqlx::Error> {
        let query = format!(
            "UPDATE run_history SET
                status = $3,
                running_at = CASE WHEN $4 THEN NOW() ELSE running_at END,
                ended_at = CASE WHEN $5 THEN NOW() ELSE ended_at END,
                failure_reason = COALESCE($6, failure_reason)
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunHistory>(&query)
            .bind(transition.run_id)
            .bind(transition.from.as_str())
            .bind(transition.to.as_str())
            .bind(transition.to == RunStatus::Running)
            .bind(transition.to.is_terminal())
            .bind(&transition.failure_reason)
            .fetch_optional(executor)
            .await
    }

    /// One page of runs matching `filter`, most recent first, plus the total.
    ///
    /// Ordered by `started_at DESC, id DESC` so pages never overlap.
    pub async fn list(
        pool: &PgPool,
        filter: &RunHistoryFilter,
        page: PageRequest,
    ) -> Result<(Vec<RunHistory>, i64), sqlx::Error> {
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if filter.case_id.is_some() {
            conditions.push(format!("case_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM run_history {where_clause}
             ORDER BY started_at DESC, id DESC
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );
        let count_query = format!("SELECT COUNT(*) FROM run_history {where_clause}");

        let mut q = sqlx::query_as::<_, RunHistory>(&query);
        let mut c = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(case_id) = filter.case_id {
            q = q.bind(case_id);
            c = c.bind(case_id);
        }
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
            c = c.bind(status.as_str());
        }

        let items = q.bind(page.limit()).bind(page.offset()).fetch_all(pool).await?;
        let total = c.fetch_one(pool).await?;
        Ok((items, total))
    }

    /// Runs that entered `running` before `cutoff` and are still running.
    pub async fn list_running_since_before(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<RunHistory>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM run_history
             WHERE status = $1 AND running_at < $2
             ORDER BY running_at ASC, id ASC"
        );
        sqlx::query_as::<_, RunHistory>(&query)
            .bind(RunStatus::Running.as_str())
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }
}
