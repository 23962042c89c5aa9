//! Postgres-backed [`PracticeStore`].

use async_trait::async_trait;
use examprep_core::question::{QuestionFilter, QuestionRow, SubjectAccess};
use examprep_core::quota::QuotaRecord;
use examprep_core::storage::{
    CommitOutcome, CommittedSession, NewPracticeSession, PracticeStore, StorageError,
};
use examprep_core::types::{DbId, UtcDay};
use sqlx::PgPool;

use crate::error::storage_error;
use crate::models::practice_session::CreatePracticeSession;
use crate::repositories::{PracticeSessionRepo, QuestionRepo, QuotaRepo, SessionQuestionRepo};

#[derive(Clone)]
pub struct PgPracticeStore {
    pool: PgPool,
}

impl PgPracticeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn commit_inner(
        &self,
        session: &NewPracticeSession,
    ) -> Result<CommitOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Quota first: if it is exhausted nothing else is written.
        if !QuotaRepo::increment_usage(&mut *tx, session.user_id, session.usage_day).await? {
            tx.rollback().await?;
            return Ok(CommitOutcome::QuotaExhausted);
        }

        let total_questions = session.total_questions();
        let row = PracticeSessionRepo::create(
            &mut *tx,
            &CreatePracticeSession {
                user_id: session.user_id,
                subject_id: session.subject_id,
                topic_id: session.topic_id,
                subtopic_id: session.subtopic_id,
                total_questions,
                max_score: total_questions,
                start_time: session.started_at,
            },
        )
        .await?;

        SessionQuestionRepo::create_batch(&mut *tx, row.id, &session.question_ids).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = session.user_id,
            session_id = row.id,
            total_questions,
            "Practice session committed"
        );

        Ok(CommitOutcome::Committed(CommittedSession {
            session_id: row.id,
            total_questions: row.total_questions,
            max_score: row.max_score,
            start_time: row.start_time,
        }))
    }
}

#[async_trait]
impl PracticeStore for PgPracticeStore {
    async fn find_quota(&self, user_id: DbId) -> Result<Option<QuotaRecord>, StorageError> {
        QuotaRepo::find_by_user(&self.pool, user_id)
            .await
            .map(|row| row.map(QuotaRecord::from))
            .map_err(storage_error)
    }

    async fn insert_quota_if_absent(
        &self,
        record: &QuotaRecord,
    ) -> Result<QuotaRecord, StorageError> {
        QuotaRepo::insert_if_absent(&self.pool, record)
            .await
            .map(QuotaRecord::from)
            .map_err(storage_error)
    }

    async fn reset_daily_usage(
        &self,
        user_id: DbId,
        today: UtcDay,
    ) -> Result<Option<QuotaRecord>, StorageError> {
        QuotaRepo::reset_daily_usage(&self.pool, user_id, today)
            .await
            .map(|row| row.map(QuotaRecord::from))
            .map_err(storage_error)
    }

    async fn find_subject(&self, subject_id: DbId) -> Result<Option<SubjectAccess>, StorageError> {
        QuestionRepo::find_subject_gate(&self.pool, subject_id)
            .await
            .map(|row| row.map(SubjectAccess::from))
            .map_err(storage_error)
    }

    async fn list_topic_ids(&self, subject_id: DbId) -> Result<Vec<DbId>, StorageError> {
        QuestionRepo::list_topic_ids(&self.pool, subject_id)
            .await
            .map_err(storage_error)
    }

    async fn list_questions(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<QuestionRow>, StorageError> {
        QuestionRepo::list_by_filter(&self.pool, filter)
            .await
            .map(|rows| rows.into_iter().map(QuestionRow::from).collect())
            .map_err(storage_error)
    }

    async fn commit_session(
        &self,
        session: &NewPracticeSession,
    ) -> Result<CommitOutcome, StorageError> {
        // Dropping an uncommitted transaction rolls it back, so any `?`
        // inside leaves no partial rows.
        self.commit_inner(session).await.map_err(storage_error)
    }
}
