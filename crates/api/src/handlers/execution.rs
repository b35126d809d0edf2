//! Handler for `POST /execute`.

use axum::extract::State;
use axum::Json;
use rftm_core::run_status::RunType;
use rftm_core::types::DbId;
use rftm_execution::ExecutionResult;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub case_ids: Vec<DbId>,
    /// `immediate` (alias `ad_hoc`) or `queued`.
    pub run_type: String,
    /// Queue priority for queued runs; lower is more urgent.
    pub priority: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub results: Vec<ExecutionResult>,
}

/// POST /api/v1/execute
pub async fn execute(
    State(state): State<AppState>,
    Json(input): Json<ExecuteRequest>,
) -> AppResult<Json<DataResponse<ExecuteResponse>>> {
    let run_type = RunType::parse(&input.run_type)?;
    let results = state
        .orchestrator
        .execute(&input.case_ids, run_type, &state.caller, input.priority)
        .await?;
    Ok(Json(DataResponse::new(ExecuteResponse { results })))
}
