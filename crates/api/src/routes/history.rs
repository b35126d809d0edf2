use axum::routing::get;
use axum::Router;

use crate::handlers::history;
use crate::state::AppState;

/// Routes mounted at `/history`.
///
/// ```text
/// GET /            -> list
/// GET /{run_id}    -> get_by_id
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(history::list))
        .route("/{run_id}", get(history::get_by_id))
}

/// Routes mounted at `/logs`.
pub fn logs_router() -> Router<AppState> {
    Router::new().route("/{run_id}", get(history::get_log))
}
