//! Session question assignment model.

use examprep_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `session_questions` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SessionQuestion {
    pub session_id: DbId,
    pub question_id: DbId,
    pub question_order: i32,
    pub time_spent_seconds: i32,
}
