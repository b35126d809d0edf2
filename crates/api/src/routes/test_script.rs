use axum::routing::get;
use axum::Router;

use crate::handlers::test_script;
use crate::state::AppState;

/// Routes mounted at `/tests`.
///
/// ```text
/// GET    /        -> list
/// POST   /        -> create
/// GET    /{id}    -> get_by_id
/// PUT    /{id}    -> update
/// DELETE /{id}    -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(test_script::list).post(test_script::create))
        .route(
            "/{id}",
            get(test_script::get_by_id)
                .put(test_script::update)
                .delete(test_script::delete),
        )
}
