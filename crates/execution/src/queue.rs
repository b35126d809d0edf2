//! Execution queue manager.
//!
//! Admission, claim and removal of [`QueueItem`]s. Ordering and claim
//! atomicity are delegated to the [`Store`]; this layer adds existence
//! checks, priority validation and error classification.

use std::sync::Arc;

use chrono::Utc;
use rftm_core::error::CoreError;
use rftm_core::queue::{validate_priority, DEFAULT_PRIORITY};
use rftm_core::types::{Caller, DbId};
use rftm_db::models::queue_item::{NewQueueItem, QueueItem};
use rftm_db::store::UQ_QUEUE_PENDING;
use rftm_db::{Store, StoreError};

#[derive(Clone)]
pub struct QueueManager {
    store: Arc<dyn Store>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Admit a pending item for `case_id`.
    ///
    /// `run_id` links the item to the run it will execute; `None` means the
    /// run is created when the item is claimed.
    pub async fn enqueue(
        &self,
        case_id: DbId,
        priority: Option<i32>,
        run_id: Option<DbId>,
        caller: &Caller,
    ) -> Result<QueueItem, CoreError> {
        let priority = priority.unwrap_or(DEFAULT_PRIORITY);
        validate_priority(priority)?;

        if self.store.get_case(case_id).await?.is_none() {
            return Err(CoreError::NotFound {
                entity: "TestCase",
                id: case_id,
            });
        }

        let input = NewQueueItem {
            case_id,
            run_id,
            priority,
            enqueued_by: caller.as_str().to_string(),
        };
        let item = match self.store.insert_queue_item(&input).await {
            Ok(item) => item,
            Err(StoreError::UniqueViolation(c)) if c == UQ_QUEUE_PENDING => {
                return Err(CoreError::Conflict(format!(
                    "Test case {case_id} already has a pending queue item"
                )));
            }
            // The case vanished between the check and the insert.
            Err(StoreError::ForeignKeyViolation(_)) => {
                return Err(CoreError::NotFound {
                    entity: "TestCase",
                    id: case_id,
                });
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            queue_item_id = item.id,
            case_id,
            run_id = ?item.run_id,
            priority,
            enqueued_by = %caller,
            "Test case enqueued",
        );
        Ok(item)
    }

    /// Claim the most urgent pending item. At most once per item.
    pub async fn dequeue_next(&self) -> Result<Option<QueueItem>, CoreError> {
        let claimed = self.store.claim_next_queue_item().await?;
        if let Some(item) = &claimed {
            tracing::debug!(
                queue_item_id = item.id,
                case_id = item.case_id,
                priority = item.priority,
                "Queue item claimed",
            );
        }
        Ok(claimed)
    }

    /// Remove every pending item for `case_id`. `false` if there were none.
    ///
    /// Runs linked to the removed items are left `pending`. Nothing drives
    /// them afterwards and `expire_stale` only covers `running` runs, so they
    /// stay in history as abandoned requests.
    pub async fn remove(&self, case_id: DbId) -> Result<bool, CoreError> {
        let removed = self.store.remove_pending_queue_items(case_id).await?;
        if removed > 0 {
            tracing::info!(case_id, removed, "Removed pending queue items");
        }
        Ok(removed > 0)
    }

    pub async fn list_pending(&self) -> Result<Vec<QueueItem>, CoreError> {
        Ok(self.store.list_pending_queue_items().await?)
    }

    /// Delete removed items older than `older_than`.
    pub async fn purge_removed(&self, older_than: chrono::Duration) -> Result<u64, CoreError> {
        let cutoff = Utc::now() - older_than;
        let purged = self.store.purge_removed_queue_items(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged, %cutoff, "Purged removed queue items");
        }
        Ok(purged)
    }
}
