use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use examprep_core::error::SessionError;
use serde_json::json;

/// Seconds a client should wait before retrying a contended creation.
const LOCK_RETRY_AFTER_SECS: &str = "1";

/// Application-level error type for HTTP handlers.
///
/// Wraps [`SessionError`] and adds the request-level failures raised by
/// extractors. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A session-creation failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Missing or unusable caller identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A malformed header or body.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_session(err: &SessionError) -> (StatusCode, &'static str, String) {
    match err {
        SessionError::InvalidRequest(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        SessionError::QuotaExceeded(denial) => (
            StatusCode::TOO_MANY_REQUESTS,
            "QUOTA_EXCEEDED",
            denial.to_string(),
        ),
        SessionError::LockContention { .. } => (
            StatusCode::CONFLICT,
            "SESSION_CREATION_IN_PROGRESS",
            "Another session is being created for this user; retry shortly".to_string(),
        ),
        SessionError::TopicAccessDenied { .. } => {
            (StatusCode::FORBIDDEN, "TOPIC_ACCESS_DENIED", err.to_string())
        }
        SessionError::NoQuestionsAvailable { .. } => {
            (StatusCode::NOT_FOUND, "NO_QUESTIONS_AVAILABLE", err.to_string())
        }
        SessionError::TransientDatabase { attempts, message } => {
            tracing::warn!(attempts, error = %message, "Database unavailable after retries");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "DATABASE_UNAVAILABLE",
                "The database is temporarily unavailable; retry later".to_string(),
            )
        }
        SessionError::CacheUnavailable(msg) => {
            tracing::warn!(error = %msg, "Shared cache unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "CACHE_UNAVAILABLE",
                "Session creation is temporarily unavailable; retry later".to_string(),
            )
        }
        SessionError::FatalDatabase(msg) => {
            tracing::error!(error = %msg, "Database error");
            internal()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Session(session) => classify_session(session),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let AppError::Session(SessionError::QuotaExceeded(denial)) = &self {
            body["limit"] = json!(denial.limit);
            body["resets_at"] = json!(denial.resets_at);
        }

        let mut response = (status, axum::Json(body)).into_response();
        if matches!(self, AppError::Session(SessionError::LockContention { .. })) {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static(LOCK_RETRY_AFTER_SECS));
        }
        response
    }
}
