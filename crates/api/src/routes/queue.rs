use axum::routing::{delete, get};
use axum::Router;

use crate::handlers::queue;
use crate::state::AppState;

/// Routes mounted at `/queue`.
///
/// ```text
/// GET    /            -> list
/// POST   /            -> enqueue
/// DELETE /{case_id}   -> remove
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(queue::list).post(queue::enqueue))
        .route("/{case_id}", delete(queue::remove))
}
