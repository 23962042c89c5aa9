//! Practice-session requests, results, and lifecycle rules.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::question::{QuestionCandidate, QuestionFilter};
use crate::types::{DbId, Timestamp};

/// Upper bound on questions per session.
pub const MAX_QUESTIONS_PER_SESSION: i32 = 100;

/// Open sessions older than this are closed by the abandonment sweep.
pub const ABANDON_AFTER_HOURS: i64 = 2;

// ---------------------------------------------------------------------------
// Request / result
// ---------------------------------------------------------------------------

/// What a user asks for when starting a practice session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(range(min = 1, message = "user_id must be positive"))]
    pub user_id: DbId,
    #[validate(range(min = 1, message = "subject_id must be positive"))]
    pub subject_id: DbId,
    pub topic_id: Option<DbId>,
    pub subtopic_id: Option<DbId>,
    #[validate(range(min = 1, max = 100, message = "question_count must be between 1 and 100"))]
    pub question_count: i32,
}

impl CreateSessionRequest {
    pub fn filter(&self) -> QuestionFilter {
        QuestionFilter {
            subject_id: self.subject_id,
            topic_id: self.topic_id,
            subtopic_id: self.subtopic_id,
        }
    }

    /// A subtopic without its topic cannot be resolved.
    pub fn check_filter_shape(&self) -> Result<(), String> {
        if self.subtopic_id.is_some() && self.topic_id.is_none() {
            return Err("subtopic_id requires topic_id".into());
        }
        Ok(())
    }
}

/// The replayable outcome of a successful creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: DbId,
    pub questions: Vec<QuestionCandidate>,
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Sessions started before the returned instant count as abandoned.
pub fn abandonment_cutoff(now: Timestamp, abandon_after_hours: i64) -> Timestamp {
    now - chrono::Duration::hours(abandon_after_hours)
}
