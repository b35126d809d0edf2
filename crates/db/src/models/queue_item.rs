//! Execution queue item model (`queue_items` table).

use rftm_core::queue::QueueStatus;
use rftm_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `queue_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueueItem {
    pub id: DbId,
    pub case_id: DbId,
    /// The run this item was derived from, `None` for direct enqueues.
    pub run_id: Option<DbId>,
    /// Lower is more urgent.
    pub priority: i32,
    #[sqlx(try_from = "String")]
    pub status: QueueStatus,
    pub enqueued_by: String,
    pub enqueued_at: Timestamp,
    pub removed_at: Option<Timestamp>,
}

/// Insert payload for a new pending queue item.
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub case_id: DbId,
    pub run_id: Option<DbId>,
    pub priority: i32,
    pub enqueued_by: String,
}
