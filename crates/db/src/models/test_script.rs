//! Test script entity model and DTOs.

use rftm_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `test_scripts` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestScript {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    /// Robot Framework source text.
    pub content: String,
    pub metadata: serde_json::Value,
    pub created_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new test script.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTestScript {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    /// Defaults to an empty body.
    pub content: Option<String>,
    /// Defaults to `{}`.
    pub metadata: Option<serde_json::Value>,
}

/// DTO for updating an existing test script. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateTestScript {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub metadata: Option<serde_json::Value>,
}
