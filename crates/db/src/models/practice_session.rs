//! Practice session model.

use examprep_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `practice_sessions` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PracticeSession {
    pub id: DbId,
    pub user_id: DbId,
    pub subject_id: DbId,
    pub topic_id: Option<DbId>,
    pub subtopic_id: Option<DbId>,
    pub total_questions: i32,
    pub is_completed: bool,
    pub start_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub score: i32,
    pub max_score: i32,
}

/// DTO for inserting a practice session.
#[derive(Debug)]
pub struct CreatePracticeSession {
    pub user_id: DbId,
    pub subject_id: DbId,
    pub topic_id: Option<DbId>,
    pub subtopic_id: Option<DbId>,
    pub total_questions: i32,
    pub max_score: i32,
    pub start_time: Timestamp,
}
