use std::time::Duration;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Upper bound on each dependency health check.
const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when every dependency answers, `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    pub storage_healthy: bool,
}

/// GET /health -- always 200, reports dependency health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (db, storage) = tokio::join!(
        tokio::time::timeout(CHECK_TIMEOUT, state.store.health_check()),
        tokio::time::timeout(CHECK_TIMEOUT, state.artifacts.health_check()),
    );
    let db_healthy = matches!(db, Ok(Ok(())));
    let storage_healthy = matches!(storage, Ok(Ok(())));

    let status = if db_healthy && storage_healthy {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        storage_healthy,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
