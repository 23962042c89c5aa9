//! Repository for the `session_questions` table.

use examprep_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::session_question::SessionQuestion;

/// Column list for session_questions queries.
const COLUMNS: &str = "session_id, question_id, question_order, time_spent_seconds";

/// Provides data access for session question assignments.
pub struct SessionQuestionRepo;

impl SessionQuestionRepo {
    /// Assign questions to a session in one statement. The question at
    /// index `i` gets `question_order = i + 1`.
    pub async fn create_batch(
        conn: &mut PgConnection,
        session_id: DbId,
        question_ids: &[DbId],
    ) -> Result<Vec<SessionQuestion>, sqlx::Error> {
        if question_ids.is_empty() {
            return Ok(vec![]);
        }

        let orders: Vec<i32> = (1..=question_ids.len())
            .map(|i| i32::try_from(i).unwrap_or(i32::MAX))
            .collect();

        let query = format!(
            "INSERT INTO session_questions (session_id, question_id, question_order) \
             SELECT $1, q.question_id, q.question_order \
             FROM UNNEST($2::bigint[], $3::int[]) AS q(question_id, question_order) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, SessionQuestion>(&query)
            .bind(session_id)
            .bind(question_ids)
            .bind(&orders)
            .fetch_all(conn)
            .await
    }

    /// List a session's assignments in presentation order.
    pub async fn list_by_session(
        pool: &PgPool,
        session_id: DbId,
    ) -> Result<Vec<SessionQuestion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM session_questions
             WHERE session_id = $1
             ORDER BY question_order"
        );
        sqlx::query_as::<_, SessionQuestion>(&query)
            .bind(session_id)
            .fetch_all(pool)
            .await
    }
}
