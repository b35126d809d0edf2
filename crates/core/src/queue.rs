//! Execution queue policy: statuses, priority bounds and ordering.
//!
//! Lower priority numbers are more urgent. Ties are broken by enqueue time
//! (FIFO) and then by id, so the order is total and deterministic.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Most urgent priority.
pub const MIN_PRIORITY: i32 = 0;

/// Least urgent priority.
pub const MAX_PRIORITY: i32 = 100;

/// Priority applied when a request does not specify one.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Status of a queue item. Stored as lowercase text in `queue_items.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a dequeue or removed by a caller.
    Removed,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Removed => "removed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, CoreError> {
        match value {
            "pending" => Ok(Self::Pending),
            "removed" => Ok(Self::Removed),
            other => Err(CoreError::Validation(format!(
                "Unknown queue status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for QueueStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Validate that `priority` lies within `MIN_PRIORITY..=MAX_PRIORITY`.
pub fn validate_priority(priority: i32) -> Result<(), CoreError> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Priority {priority} out of range. Must be between {MIN_PRIORITY} and {MAX_PRIORITY} (lower is more urgent)"
        )))
    }
}

/// Dequeue order of two pending items: `(priority, enqueued_at, id)` ascending.
///
/// Mirrors `ORDER BY priority ASC, enqueued_at ASC, id ASC` in the
/// PostgreSQL store.
pub fn dequeue_order(
    a: (i32, Timestamp, DbId),
    b: (i32, Timestamp, DbId),
) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| a.1.cmp(&b.1))
        .then_with(|| a.2.cmp(&b.2))
}
