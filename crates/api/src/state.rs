use std::sync::Arc;

use examprep_sessions::SessionCreator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone; everything heavy sits behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: examprep_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session-creation coordinator, wired to the shared cache and store.
    pub sessions: Arc<SessionCreator>,
}
