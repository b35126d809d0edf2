//! Repository for the `test_cases` table.

use rftm_core::pagination::PageRequest;
use rftm_core::types::DbId;
use sqlx::PgPool;

use crate::models::test_case::{CreateTestCase, TestCase, TestCaseFilter, UpdateTestCase};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str =
    "id, test_script_id, name, description, variables, created_at, updated_at";

/// Provides CRUD operations for test cases.
pub struct TestCaseRepo;

impl TestCaseRepo {
    /// Insert a new case. Fails with a foreign-key violation if the parent
    /// script does not exist.
    pub async fn create(pool: &PgPool, input: &CreateTestCase) -> Result<TestCase, sqlx::Error> {
        let query = format!(
            "INSERT INTO test_cases (test_script_id, name, description, variables)
             VALUES ($1, $2, $3, COALESCE($4, '{{}}'::jsonb))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TestCase>(&query)
            .bind(input.test_script_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.variables)
            .fetch_one(pool)
            .await
    }

    /// Find a case by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TestCase>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM test_cases WHERE id = $1");
        sqlx::query_as::<_, TestCase>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Return the subset of `ids` that exist, in no particular order.
    pub async fn existing_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM test_cases WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// One page of cases matching `filter`, newest first, plus the total.
    pub async fn list(
        pool: &PgPool,
        filter: &TestCaseFilter,
        page: PageRequest,
    ) -> Result<(Vec<TestCase>, i64), sqlx::Error> {
        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if filter.test_script_id.is_some() {
            conditions.push(format!("test_script_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.name.is_some() {
            conditions.push(format!("name ILIKE ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let query = format!(
            "SELECT {COLUMNS} FROM test_cases {where_clause}
             ORDER BY created_at DESC, id DESC
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1,
        );
        let count_query = format!("SELECT COUNT(*) FROM test_cases {where_clause}");

        let pattern = filter.name.as_deref().map(|n| format!("%{}%", escape_like(n)));

        let mut q = sqlx::query_as::<_, TestCase>(&query);
        let mut c = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(script_id) = filter.test_script_id {
            q = q.bind(script_id);
            c = c.bind(script_id);
        }
        if let Some(p) = &pattern {
            q = q.bind(p.clone());
            c = c.bind(p.clone());
        }

        let items = q.bind(page.limit()).bind(page.offset()).fetch_all(pool).await?;
        let total = c.fetch_one(pool).await?;
        Ok((items, total))
    }

    /// Update a case. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTestCase,
    ) -> Result<Option<TestCase>, sqlx::Error> {
        let query = format!(
            "UPDATE test_cases SET
                test_script_id = COALESCE($2, test_script_id),
                name = COALESCE($3, name),
                description = COALESCE($4, description),
                variables = COALESCE($5, variables),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TestCase>(&query)
            .bind(id)
            .bind(input.test_script_id)
            .bind(&input.name)
            .bind(&input.description)
            .bind(&input.variables)
            .fetch_optional(pool)
            .await
    }

    /// Delete a case and its queue items. Fails with a foreign-key
    /// violation if the case has run history.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM test_cases WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether the case has any run history.
    pub async fn has_runs(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM run_history WHERE case_id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
