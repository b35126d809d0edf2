//! Handlers for the `/cases` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rftm_core::error::CoreError;
use rftm_core::pagination::Page;
use rftm_core::types::DbId;
use rftm_core::validation::{validate_json_object, validate_name};
use rftm_db::models::test_case::{CreateTestCase, TestCase, UpdateTestCase};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::query::CaseListParams;
use crate::response::DataResponse;
use crate::state::AppState;

fn not_found(id: DbId) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "TestCase",
        id,
    })
}

async fn ensure_script_exists(state: &AppState, script_id: DbId) -> AppResult<()> {
    match state.store.get_script(script_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::Core(CoreError::NotFound {
            entity: "TestScript",
            id: script_id,
        })),
    }
}

/// POST /api/v1/cases
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateTestCase>,
) -> AppResult<(StatusCode, Json<DataResponse<TestCase>>)> {
    input.validate()?;
    validate_name("name", &input.name)?;
    if let Some(variables) = &input.variables {
        validate_json_object("variables", variables)?;
    }
    ensure_script_exists(&state, input.test_script_id).await?;

    let case = state.store.create_case(&input).await?;
    tracing::info!(
        case_id = case.id,
        script_id = case.test_script_id,
        "Test case created",
    );
    Ok((StatusCode::CREATED, Json(DataResponse::new(case))))
}

/// GET /api/v1/cases
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<CaseListParams>,
) -> AppResult<Json<DataResponse<Page<TestCase>>>> {
    let page = params.page_request(&state.config)?;
    let (items, total) = state.store.list_cases(&params.filter(), page).await?;
    Ok(Json(DataResponse::new(Page::new(items, total, page))))
}

/// GET /api/v1/cases/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<TestCase>>> {
    let case = state.store.get_case(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse::new(case)))
}

/// PUT /api/v1/cases/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateTestCase>,
) -> AppResult<Json<DataResponse<TestCase>>> {
    input.validate()?;
    if let Some(name) = &input.name {
        validate_name("name", name)?;
    }
    if let Some(variables) = &input.variables {
        validate_json_object("variables", variables)?;
    }
    if let Some(script_id) = input.test_script_id {
        ensure_script_exists(&state, script_id).await?;
    }

    let case = state
        .store
        .update_case(id, &input)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(DataResponse::new(case)))
}

/// DELETE /api/v1/cases/{id}
///
/// Refused with 409 while the case has run history.
pub async fn delete(State(state): State<AppState>, Path(id): Path<DbId>) -> AppResult<StatusCode> {
    if state.store.case_has_runs(id).await? {
        return Err(AppError::Core(CoreError::Conflict(format!(
            "Test case {id} has run history and cannot be deleted"
        ))));
    }
    if state.store.delete_case(id).await? {
        tracing::info!(case_id = id, "Test case deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(id))
    }
}
