//! Repository for the `test_scripts` table.

use rftm_core::pagination::PageRequest;
use rftm_core::types::DbId;
use sqlx::PgPool;

use crate::models::test_script::{CreateTestScript, TestScript, UpdateTestScript};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, name, description, content, metadata, created_by, created_at, updated_at";

/// Provides CRUD operations for test scripts.
pub struct TestScriptRepo;

impl TestScriptRepo {
    /// Insert a new script, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateTestScript,
        created_by: &str,
    ) -> Result<TestScript, sqlx::Error> {
        let query = format!(
            "INSERT INTO test_scripts (name, description, content, metadata, created_by)
             VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, '{{}}'::jsonb), $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TestScript>(&query)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.content)
            .bind(&input.metadata)
            .bind(created_by)
            .fetch_one(pool)
            .await
    }

    /// Find a script by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TestScript>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM test_scripts WHERE id = $1");
        sqlx::query_as::<_, TestScript>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// One page of scripts, newest first, plus the total count.
    pub async fn list(
        pool: &PgPool,
        page: PageRequest,
    ) -> Result<(Vec<TestScript>, i64), sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM test_scripts
             ORDER BY created_at DESC, id DESC
             LIMIT $1 OFFSET $2"
        );
        let items = sqlx::query_as::<_, TestScript>(&query)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM test_scripts")
            .fetch_one(pool)
            .await?;
        Ok((items, total))
    }

    /// Update a script. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTestScript,
    ) -> Result<Option<TestScript>, sqlx::Error> {
        let query = format!(
            "UPDATE test_scripts SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                content = COALESCE($4, content),
                metadata = COALESCE($5, metadata),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TestScript>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.content)
            .bind(&input.metadata)
            .fetch_optional(pool)
            .await
    }

    /// Delete a script and, by cascade, its cases and their queue items.
    ///
    /// Fails with a foreign-key violation if any of its cases has run
    /// history. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM test_scripts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether any case of this script has run history.
    pub async fn has_runs(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM run_history r
                 JOIN test_cases c ON c.id = r.case_id
                 WHERE c.test_script_id = $1
             )",
        )
        .bind(id)
        .fetch_one(pool)
        .await
    }
}
