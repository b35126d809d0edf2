use axum::routing::post;
use axum::Router;

use crate::handlers::execution;
use crate::state::AppState;

/// `POST /execute`.
pub fn router() -> Router<AppState> {
    Router::new().route("/execute", post(execution::execute))
}
