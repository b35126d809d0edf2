use axum::routing::get;
use axum::Router;

use crate::handlers::test_case;
use crate::state::AppState;

/// Routes mounted at `/cases`.
///
/// ```text
/// GET    /        -> list (?test_script_id=&name=&page=&page_size=)
/// POST   /        -> create
/// GET    /{id}    -> get_by_id
/// PUT    /{id}    -> update
/// DELETE /{id}    -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(test_case::list).post(test_case::create))
        .route(
            "/{id}",
            get(test_case::get_by_id)
                .put(test_case::update)
                .delete(test_case::delete),
        )
}
