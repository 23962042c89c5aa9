//! Repository for the `practice_sessions` table.

use examprep_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::practice_session::{CreatePracticeSession, PracticeSession};

/// Column list for practice_sessions queries.
const COLUMNS: &str = "id, user_id, subject_id, topic_id, subtopic_id, total_questions, \
    is_completed, start_time, end_time, score, max_score";

/// Provides data access for practice sessions.
pub struct PracticeSessionRepo;

impl PracticeSessionRepo {
    /// Insert a new session. Intended to run inside the creation transaction.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreatePracticeSession,
    ) -> Result<PracticeSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO practice_sessions
                (user_id, subject_id, topic_id, subtopic_id, total_questions, max_score, start_time)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PracticeSession>(&query)
            .bind(input.user_id)
            .bind(input.subject_id)
            .bind(input.topic_id)
            .bind(input.subtopic_id)
            .bind(input.total_questions)
            .bind(input.max_score)
            .bind(input.start_time)
            .fetch_one(conn)
            .await
    }

    /// List a user's sessions, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: DbId,
        limit: i64,
    ) -> Result<Vec<PracticeSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM practice_sessions
             WHERE user_id = $1
             ORDER BY start_time DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, PracticeSession>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Close every open session started before `cutoff`.
    ///
    /// Returns the number of sessions closed.
    pub async fn complete_abandoned(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE practice_sessions
             SET is_completed = true, end_time = NOW()
             WHERE NOT is_completed AND start_time < $1",
        )
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
