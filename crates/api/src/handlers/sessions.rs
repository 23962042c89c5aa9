//! Handlers for practice-session creation and quota status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use examprep_core::practice_session::CreateSessionRequest;
use examprep_core::types::DbId;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::user::{CurrentUser, IdempotencyKey};
use crate::state::AppState;

/// Body of `POST /api/v1/sessions`. The user comes from the request headers.
#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub subject_id: DbId,
    pub topic_id: Option<DbId>,
    pub subtopic_id: Option<DbId>,
    pub question_count: i32,
}

/// POST /api/v1/sessions
///
/// Start a practice session. Send an `Idempotency-Key` header to make
/// client retries safe.
pub async fn create_session(
    user: CurrentUser,
    IdempotencyKey(token): IdempotencyKey,
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> AppResult<impl IntoResponse> {
    let request = CreateSessionRequest {
        user_id: user.user_id,
        subject_id: body.subject_id,
        topic_id: body.topic_id,
        subtopic_id: body.subtopic_id,
        question_count: body.question_count,
    };

    let created = state
        .sessions
        .create_session(&request, token.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/quota
///
/// Today's quota for the calling user.
pub async fn get_quota(
    user: CurrentUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let now = state.sessions.now();
    let status = state.sessions.ledger().status(user.user_id, now).await?;
    Ok(Json(status))
}
