use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sessions;
use crate::state::AppState;

/// Session routes, mounted under `/api/v1`.
///
/// ```text
/// POST /sessions   -> create_session
/// GET  /quota      -> get_quota
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(sessions::create_session))
        .route("/quota", get(sessions::get_quota))
}
