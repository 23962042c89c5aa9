//! The relational-store seam used by the session coordinator.
//!
//! The production implementation lives in the `db` crate (Postgres via
//! sqlx); an in-memory one lives in the `sessions` crate for tests and
//! single-process development.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::question::{QuestionFilter, QuestionRow, SubjectAccess};
use crate::quota::QuotaRecord;
use crate::retry::Transient;
use crate::types::{DbId, Timestamp, UtcDay};

/// A storage failure, already classified for the retry helper.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Connection exhausted, terminated, or never established.
    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage failure: {0}")]
    Fatal(String),
}

impl Transient for StorageError {
    fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

/// Everything needed to write one practice session in a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPracticeSession {
    pub user_id: DbId,
    pub subject_id: DbId,
    pub topic_id: Option<DbId>,
    pub subtopic_id: Option<DbId>,
    /// Selected questions in presentation order; position `i` gets order `i + 1`.
    pub question_ids: Vec<DbId>,
    /// The UTC day the quota increment is booked against.
    pub usage_day: UtcDay,
    pub started_at: Timestamp,
}

impl NewPracticeSession {
    /// `total_questions` and `max_score` both follow the actual selection size.
    pub fn total_questions(&self) -> i32 {
        i32::try_from(self.question_ids.len()).unwrap_or(i32::MAX)
    }
}

/// A session row as written by [`PracticeStore::commit_session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedSession {
    pub session_id: DbId,
    pub total_questions: i32,
    pub max_score: i32,
    pub start_time: Timestamp,
}

/// Result of the all-or-nothing creation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(CommittedSession),
    /// The guarded quota increment matched no row; nothing was written.
    QuotaExhausted,
}

/// Relational storage consumed and produced by session creation.
#[async_trait]
pub trait PracticeStore: Send + Sync {
    async fn find_quota(&self, user_id: DbId) -> Result<Option<QuotaRecord>, StorageError>;

    /// Insert a fresh quota row unless one exists, then return the stored row.
    async fn insert_quota_if_absent(&self, record: &QuotaRecord)
        -> Result<QuotaRecord, StorageError>;

    /// Zero `used_today` if `last_usage_day` is not `today`. Returns the
    /// current row either way.
    async fn reset_daily_usage(
        &self,
        user_id: DbId,
        today: UtcDay,
    ) -> Result<Option<QuotaRecord>, StorageError>;

    async fn find_subject(&self, subject_id: DbId) -> Result<Option<SubjectAccess>, StorageError>;

    /// Topic ids of a subject, ascending.
    async fn list_topic_ids(&self, subject_id: DbId) -> Result<Vec<DbId>, StorageError>;

    /// Raw question rows matching the exact filter tuple.
    async fn list_questions(&self, filter: &QuestionFilter)
        -> Result<Vec<QuestionRow>, StorageError>;

    /// Insert the session, its question assignments, and the guarded quota
    /// increment as one transaction. Any failure rolls back all three.
    async fn commit_session(&self, session: &NewPracticeSession)
        -> Result<CommitOutcome, StorageError>;
}
