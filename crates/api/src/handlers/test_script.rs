//! Handlers for the `/tests` resource (test scripts).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rftm_core::error::CoreError;
use rftm_core::pagination::Page;
use rftm_core::types::DbId;
use rftm_core::validation::{validate_json_object, validate_name};
use rftm_db::models::test_script::{CreateTestScript, TestScript, UpdateTestScript};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "TestScript",
        id,
    })
}

/// POST /api/v1/tests
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateTestScript>,
) -> AppResult<(StatusCode, Json<DataResponse<TestScript>>)> {
    input.validate()?;
    validate_name("name", &input.name)?;
    if let Some(metadata) = &input.metadata {
        validate_json_object("metadata", metadata)?;
    }

    let script = state
        .store
        .create_script(&input, state.caller.as_str())
        .await?;
    tracing::info!(script_id = script.id, name = %script.name, "Test script created");
    Ok((StatusCode::CREATED, Json(DataResponse::new(script))))
}

/// GET /api/v1/tests
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Page<TestScript>>>> {
    let page = params.page_request(&state.config)?;
    let (items, total) = state.store.list_scripts(page).await?;
    Ok(Json(DataResponse::new(Page::new(items, total, page))))
}

/// GET /api/v1/tests/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TestScript>>> {
    let script = state.store.get_script(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse::new(script)))
}

/// PUT /api/v1/tests/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateTestScript>,
) -> AppResult<Json<DataResponse<TestScript>>> {
    input.validate()?;
    if let Some(name) = &input.name {
        validate_name("name", name)?;
    }
    if let Some(metadata) = &input.metadata {
        validate_json_object("metadata", metadata)?;
    }

    let script = state
        .store
        .update_script(id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse::new(script)))
}

/// DELETE /api/v1/tests/{id}
///
/// Removes the script with its cases and their queue items. Refused with 409
/// while any of its cases has run history.
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if state.store.script_has_runs(id).await? {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Test script {id} has run history and cannot be deleted"
        ))));
    }
    if state.store.delete_script(id).await? {
        tracing::info!(script_id = id, "Test script deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
