//! Repository for the `queue_items` table.
//!
//! Items are never updated except by the two status-changing statements
//! here (`claim_next`, `remove_pending_for_case`), both conditional on the
//! row still being `pending`.

use rftm_core::queue::QueueStatus;
use rftm_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::queue_item::{NewQueueItem, QueueItem};

/// Column list for `queue_items` queries.
const COLUMNS: &str = "id, case_id, run_id, priority, status, enqueued_by, enqueued_at, removed_at";

/// Provides admission, claim and removal for queue items.
pub struct QueueItemRepo;

impl QueueItemRepo {
    /// Insert a pending item.
    ///
    /// Violates `uq_queue_items_pending_case_run` if a pending item for the
    /// same (case, run) pair already exists.
    pub async fn insert(pool: &PgPool, input: &NewQueueItem) -> Result<QueueItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO queue_items (case_id, run_id, priority, status, enqueued_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(input.case_id)
            .bind(input.run_id)
            .bind(input.priority)
            .bind(QueueStatus::Pending.as_str())
            .bind(&input.enqueued_by)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the most urgent pending item.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent claimers never
    /// pick the same row, and re-checks `status` in the outer `UPDATE` so a
    /// row removed in the meantime is never returned.
    pub async fn claim_next(pool: &PgPool) -> Result<Option<QueueItem>, sqlx::Error> {
        let query = format!(
            "UPDATE queue_items
             SET status = $1, removed_at = NOW()
             WHERE id = (
                 SELECT id FROM queue_items
                 WHERE status = $2
                 ORDER BY priority ASC, enqueued_at ASC, id ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(QueueStatus::Removed.as_str())
            .bind(QueueStatus::Pending.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Mark every pending item for `case_id` as removed. Returns the count.
    pub async fn remove_pending_for_case(pool: &PgPool, case_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE queue_items SET status = $2, removed_at = NOW()
             WHERE case_id = $1 AND status = $3",
        )
        .bind(case_id)
        .bind(QueueStatus::Removed.as_str())
        .bind(QueueStatus::Pending.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// All pending items in dequeue order.
    pub async fn list_pending(pool: &PgPool) -> Result<Vec<QueueItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM queue_items
             WHERE status = $1
             ORDER BY priority ASC, enqueued_at ASC, id ASC"
        );
        sqlx::query_as::<_, QueueItem>(&query)
            .bind(QueueStatus::Pending.as_str())
            .fetch_all(pool)
            .await
    }

    /// Delete removed items whose `removed_at` is before `cutoff`.
    pub async fn purge_removed_before(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM queue_items WHERE status = $1 AND removed_at < $2")
            .bind(QueueStatus::Removed.as_str())
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
