pub mod execution;
pub mod health;
pub mod history;
pub mod queue;
pub mod test_case;
pub mod test_script;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /execute                      run test cases now or queue them (POST)
///
/// /queue                        list pending, enqueue
/// /queue/{case_id}              remove pending items (DELETE)
///
/// /history                      list runs (filtered, paginated)
/// /history/{run_id}             run detail
/// /logs/{run_id}                presigned log URL
///
/// /tests                        list, create scripts
/// /tests/{id}                   get, update, delete
///
/// /cases                        list (filtered, paginated), create
/// /cases/{id}                   get, update, delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(execution::router())
        .nest("/queue", queue::router())
        .nest("/history", history::router())
        .nest("/logs", history::logs_router())
        .nest("/tests", test_script::router())
        .nest("/cases", test_case::router())
}
