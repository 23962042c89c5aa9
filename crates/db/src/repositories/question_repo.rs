//! Read-only access to the question bank (`questions`, `topics`, `subjects`).

use examprep_core::question::QuestionFilter;
use examprep_core::types::DbId;
use sqlx::PgPool;

use crate::models::question::{QuestionProjection, SubjectGate};

/// Column list for question projections.
const COLUMNS: &str = "id, topic_id, subtopic_id, marks, question_type, details";

/// Provides read access to questions, topics, and subject gating.
pub struct QuestionRepo;

impl QuestionRepo {
    /// Active questions matching the exact filter tuple. Absent topic or
    /// subtopic filters match any value.
    pub async fn list_by_filter(
        pool: &PgPool,
        filter: &QuestionFilter,
    ) -> Result<Vec<QuestionProjection>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM questions
             WHERE is_active
               AND subject_id = $1
               AND ($2::bigint IS NULL OR topic_id = $2)
               AND ($3::bigint IS NULL OR subtopic_id = $3)
             ORDER BY id"
        );
        sqlx::query_as::<_, QuestionProjection>(&query)
            .bind(filter.subject_id)
            .bind(filter.topic_id)
            .bind(filter.subtopic_id)
            .fetch_all(pool)
            .await
    }

    /// Topic ids of a subject in ascending order.
    pub async fn list_topic_ids(pool: &PgPool, subject_id: DbId) -> Result<Vec<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, DbId>("SELECT id FROM topics WHERE subject_id = $1 ORDER BY id")
            .bind(subject_id)
            .fetch_all(pool)
            .await
    }

    /// Freemium settings of a subject.
    pub async fn find_subject_gate(
        pool: &PgPool,
        subject_id: DbId,
    ) -> Result<Option<SubjectGate>, sqlx::Error> {
        sqlx::query_as::<_, SubjectGate>(
            "SELECT id, is_freemium, free_topic_count FROM subjects WHERE id = $1",
        )
        .bind(subject_id)
        .fetch_optional(pool)
        .await
    }
}
