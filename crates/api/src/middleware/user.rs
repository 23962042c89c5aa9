//! Caller identity and idempotency-key extractors.
//!
//! Authentication happens upstream; the gateway forwards the verified user
//! id in `x-user-id`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use examprep_core::types::DbId;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// The calling user, taken from the `x-user-id` header.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: DbId,
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Unauthorized(format!("Missing {USER_ID_HEADER} header"))
            })?;

        let user_id = raw
            .trim()
            .parse::<DbId>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| {
                AppError::Unauthorized(format!("Invalid {USER_ID_HEADER} header"))
            })?;

        Ok(CurrentUser { user_id })
    }
}

/// Optional client token from the `Idempotency-Key` header. Its format is
/// checked by the session coordinator.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyKey(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for IdempotencyKey {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.headers.get(IDEMPOTENCY_KEY_HEADER) {
            None => Ok(IdempotencyKey(None)),
            Some(value) => value
                .to_str()
                .map(|s| IdempotencyKey(Some(s.trim().to_string())))
                .map_err(|_| {
                    AppError::BadRequest(format!("{IDEMPOTENCY_KEY_HEADER} must be ASCII"))
                }),
        }
    }
}
