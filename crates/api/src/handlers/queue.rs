//! Handlers for the `/queue` resource.

use axum::extract::{Path, State};
use axum::Json;
use rftm_core::types::{DbId, Timestamp};
use rftm_db::models::queue_item::QueueItem;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// A pending item as shown by `GET /queue`.
#[derive(Debug, Serialize)]
pub struct QueueItemView {
    pub queue_item_id: DbId,
    pub case_id: DbId,
    pub run_id: Option<DbId>,
    pub priority: i32,
    pub enqueued_at: Timestamp,
}

impl From<QueueItem> for QueueItemView {
    fn from(item: QueueItem) -> Self {
        Self {
            queue_item_id: item.id,
            case_id: item.case_id,
            run_id: item.run_id,
            priority: item.priority,
            enqueued_at: item.enqueued_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueList {
    pub items: Vec<QueueItemView>,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub case_id: DbId,
    pub priority: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct Enqueued {
    pub queue_item_id: DbId,
}

#[derive(Debug, Serialize)]
pub struct Removed {
    pub removed: bool,
}

/// GET /api/v1/queue
pub async fn list(State(state): State<AppState>) -> AppResult<Json<DataResponse<QueueList>>> {
    let items = state.orchestrator.queue().list_pending().await?;
    Ok(Json(DataResponse::new(QueueList {
        items: items.into_iter().map(QueueItemView::from).collect(),
    })))
}

/// POST /api/v1/queue
pub async fn enqueue(
    State(state): State<AppState>,
    Json(input): Json<EnqueueRequest>,
) -> AppResult<Json<DataResponse<Enqueued>>> {
    let item = state
        .orchestrator
        .queue()
        .enqueue(input.case_id, input.priority, None, &state.caller)
        .await?;
    Ok(Json(DataResponse::new(Enqueued {
        queue_item_id: item.id,
    })))
}

/// DELETE /api/v1/queue/{case_id}
pub async fn remove(
    State(state): State<AppState>,
    Path(case_id): Path<DbId>,
) -> AppResult<Json<DataResponse<Removed>>> {
    let removed = state.orchestrator.queue().remove(case_id).await?;
    Ok(Json(DataResponse::new(Removed { removed })))
}
