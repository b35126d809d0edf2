//! Handlers for `/history` and `/logs`.
//!
//! A queued run whose queue item was removed through `DELETE /queue/{case_id}`
//! never leaves `pending`; it is listed here with no `running_at`, no
//! `ended_at` and no log.

use axum::extract::{Path, Query, State};
use axum::Json;
use rftm_core::error::CoreError;
use rftm_core::pagination::Page;
use rftm_core::run_status::{RunStatus, RunType};
use rftm_core::types::{DbId, Timestamp};
use rftm_db::models::run_history::RunHistory;
use rftm_storage::PresignedUrl;
use serde::Serialize;

use crate::error::AppResult;
use crate::query::HistoryParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// A run as rendered by the history endpoints.
#[derive(Debug, Serialize)]
pub struct RunView {
    pub run_id: DbId,
    pub case_id: DbId,
    pub run_type: RunType,
    pub status: RunStatus,
    pub executor: String,
    pub started_at: Timestamp,
    pub running_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub failure_reason: Option<String>,
}

impl From<RunHistory> for RunView {
    fn from(run: RunHistory) -> Self {
        Self {
            run_id: run.id,
            case_id: run.case_id,
            run_type: run.run_type,
            status: run.status,
            executor: run.executor,
            started_at: run.started_at,
            running_at: run.running_at,
            ended_at: run.ended_at,
            failure_reason: run.failure_reason,
        }
    }
}

/// `GET /history/{run_id}` payload: the run plus a fresh log URL.
#[derive(Debug, Serialize)]
pub struct RunDetail {
    #[serde(flatten)]
    pub run: RunView,
    /// `None` until a log is linked, or while storage is unreachable.
    pub log_url: Option<String>,
}

/// GET /api/v1/history
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<DataResponse<Page<RunView>>>> {
    let filter = params.filter()?;
    let page = params.page_request(&state.config)?;
    let runs = state.orchestrator.history().list(&filter, page).await?;
    Ok(Json(DataResponse::new(runs.map(RunView::from))))
}

/// GET /api/v1/history/{run_id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<Json<DataResponse<RunDetail>>> {
    let history = state.orchestrator.history();
    let run = history.get(run_id).await?;

    let log_url = match history.log(run_id).await? {
        Some(log) => match state
            .artifacts
            .get_url(&log.storage_key, state.config.storage.log_url_ttl)
            .await
        {
            Ok(url) => Some(url.url),
            Err(e) => {
                tracing::warn!(run_id, error = %e, "Could not mint log URL");
                None
            }
        },
        None => None,
    };

    Ok(Json(DataResponse::new(RunDetail {
        run: RunView::from(run),
        log_url,
    })))
}

/// GET /api/v1/logs/{run_id}
pub async fn get_log(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<Json<DataResponse<PresignedUrl>>> {
    let history = state.orchestrator.history();
    history.get(run_id).await?;

    let log = history.log(run_id).await?.ok_or(CoreError::NotFound {
        entity: "RunLog",
        id: run_id,
    })?;
    let url = state
        .artifacts
        .get_url(&log.storage_key, state.config.storage.log_url_ttl)
        .await?;
    Ok(Json(DataResponse::new(url)))
}
