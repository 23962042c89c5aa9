use crate::question::QuestionFilter;
use crate::quota::QuotaDenial;
use crate::retry::RetryFailure;
use crate::storage::StorageError;
use crate::types::DbId;

/// Every way a practice-session creation request can fail.
///
/// Only [`SessionError::TransientDatabase`] is ever the product of internal
/// retries; all other variants are returned on first occurrence and the
/// caller decides whether to try again.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Daily quota is spent. Carries the limit and the next reset instant.
    #[error("{0}")]
    QuotaExceeded(QuotaDenial),

    /// Another creation for the same user holds the lock. Retry shortly.
    #[error("A practice session is already being created for user {user_id}")]
    LockContention { user_id: DbId },

    #[error("Topic {topic_id} of subject {subject_id} requires a premium plan")]
    TopicAccessDenied { subject_id: DbId, topic_id: DbId },

    #[error("No questions available for {filter}")]
    NoQuestionsAvailable { filter: QuestionFilter },

    #[error("Database unavailable after {attempts} attempts: {message}")]
    TransientDatabase { attempts: u32, message: String },

    #[error("Database error: {0}")]
    FatalDatabase(String),

    /// The shared cache could not answer a lock request; creation fails closed.
    #[error("Shared cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl SessionError {
    /// Whether retrying the same request later may succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::LockContention { .. }
                | SessionError::TransientDatabase { .. }
                | SessionError::CacheUnavailable(_)
        )
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Transient(message) => SessionError::TransientDatabase {
                attempts: 1,
                message,
            },
            StorageError::Fatal(message) => SessionError::FatalDatabase(message),
        }
    }
}

impl From<RetryFailure<StorageError>> for SessionError {
    fn from(failure: RetryFailure<StorageError>) -> Self {
        match failure.error {
            StorageError::Transient(message) => SessionError::TransientDatabase {
                attempts: failure.attempts,
                message,
            },
            StorageError::Fatal(message) => SessionError::FatalDatabase(message),
        }
    }
}
