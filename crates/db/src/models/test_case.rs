//! Test case entity model and DTOs.

use rftm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `test_cases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestCase {
    pub id: DbId,
    pub test_script_id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub variables: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new test case.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTestCase {
    pub test_script_id: DbId,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `{}`.
    pub variables: Option<serde_json::Value>,
}

/// DTO for updating an existing test case. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTestCase {
    pub test_script_id: Option<DbId>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub variables: Option<serde_json::Value>,
}

/// Filters for listing test cases.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestCaseFilter {
    pub test_script_id: Option<DbId>,
    /// Case-insensitive substring match on the case name.
    pub name: Option<String>,
}
