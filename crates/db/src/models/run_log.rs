//! Run log model (`run_logs` table).

use rftm_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Content type recorded when a caller does not provide one.
pub const DEFAULT_LOG_CONTENT_TYPE: &str = "text/plain";

/// A row from the `run_logs` table: where a run's log artifact lives.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RunLog {
    pub id: DbId,
    pub run_id: DbId,
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: Option<i64>,
    pub created_at: Timestamp,
}

/// Reference to an uploaded log artifact, linked when a run finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRunLog {
    pub storage_key: String,
    pub content_type: String,
    pub size_bytes: Option<i64>,
}

impl NewRunLog {
    /// A plain-text log reference with unknown size.
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            content_type: DEFAULT_LOG_CONTENT_TYPE.to_string(),
            size_bytes: None,
        }
    }

    pub fn with_size(mut self, size_bytes: i64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}
