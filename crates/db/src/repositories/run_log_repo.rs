//! Repository for the `run_logs` table.

use rftm_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::run_log::{NewRunLog, RunLog};

const COLUMNS: &str = "id, run_id, storage_key, content_type, size_bytes, created_at";

pub struct RunLogRepo;

impl RunLogRepo {
    /// Link a log artifact to a run. At most one log per run.
    pub async fn create<'e>(
        executor: impl PgExecutor<'e>,
        run_id: DbId,
        input: &NewRunLog,
    ) -> Result<RunLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO run_logs (run_id, storage_key, content_type, size_bytes)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RunLog>(&query)
            .bind(run_id)
            .bind(&input.storage_key)
            .bind(&input.content_type)
            .bind(input.size_bytes)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_run(pool: &PgPool, run_id: DbId) -> Result<Option<RunLog>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM run_logs WHERE run_id = $1");
        sqlx::query_as::<_, RunLog>(&query)
            .bind(run_id)
            .fetch_optional(pool)
            .await
    }
}
