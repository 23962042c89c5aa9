//! Shared application router builder.
//!
//! [`build_app_router`] is used by both the binary and the integration
//! tests so they run the same middleware stack.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use examprep_sessions::SessionSettings;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::middleware::user::{IDEMPOTENCY_KEY_HEADER, USER_ID_HEADER};
use crate::routes;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Session-creation bodies are a handful of ids.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Build the full application [`Router`].
///
/// Layers, outermost first: CORS, request id, tracing, request-id
/// propagation, timeout, panic recovery, body limit.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = build_cors_layer(config);
    let timeout = request_timeout(config, state.sessions.settings());
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// The configured timeout, raised if needed so a creation is never dropped
/// while it may still be committing.
pub fn request_timeout(config: &ServerConfig, settings: &SessionSettings) -> Duration {
    let configured = Duration::from_secs(config.request_timeout_secs);
    let floor = settings.creation_time_bound();
    if configured < floor {
        tracing::warn!(
            configured_secs = config.request_timeout_secs,
            floor_ms = floor.as_millis() as u64,
            "REQUEST_TIMEOUT_SECS is below the session creation bound; raising it"
        );
        return floor;
    }
    configured
}

/// Build the CORS middleware layer from server configuration.
///
/// Browsers see `Retry-After` on contention and the request id for support
/// tickets. Panics at startup if any configured origin is invalid.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(IDEMPOTENCY_KEY_HEADER),
        ])
        .expose_headers([RETRY_AFTER, HeaderName::from_static(REQUEST_ID_HEADER)])
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(request_timeout_secs: u64) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_origins: vec![],
            request_timeout_secs,
        }
    }

    #[test]
    fn short_request_timeout_is_raised_to_creation_bound() {
        let settings = SessionSettings::default();
        assert_eq!(
            request_timeout(&config(5), &settings),
            settings.creation_time_bound()
        );
    }

    #[test]
    fn long_request_timeout_is_kept() {
        let settings = SessionSettings::default();
        assert_eq!(
            request_timeout(&config(60), &settings),
            Duration::from_secs(60)
        );
    }
}
