pub mod health;
pub mod sessions;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /sessions    create (POST)
/// /quota       current user's quota (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(sessions::router())
}
