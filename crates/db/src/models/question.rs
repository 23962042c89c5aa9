//! Question bank projections (read-only).

use examprep_core::question::{QuestionRow, SubjectAccess};
use examprep_core::types::DbId;
use sqlx::FromRow;

/// The columns of `questions` needed for session assembly.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionProjection {
    pub id: DbId,
    pub topic_id: DbId,
    pub subtopic_id: Option<DbId>,
    pub marks: i32,
    pub question_type: String,
    pub details: serde_json::Value,
}

impl From<QuestionProjection> for QuestionRow {
    fn from(row: QuestionProjection) -> Self {
        QuestionRow {
            question_id: row.id,
            topic_id: row.topic_id,
            subtopic_id: row.subtopic_id,
            marks: row.marks,
            question_type: row.question_type,
            details: row.details,
        }
    }
}

/// Freemium settings of a `subjects` row.
#[derive(Debug, Clone, FromRow)]
pub struct SubjectGate {
    pub id: DbId,
    pub is_freemium: bool,
    pub free_topic_count: i32,
}

impl From<SubjectGate> for SubjectAccess {
    fn from(row: SubjectGate) -> Self {
        SubjectAccess {
            subject_id: row.id,
            is_freemium: row.is_freemium,
            free_topic_count: row.free_topic_count,
        }
    }
}
