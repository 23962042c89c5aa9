//! Shared-cache key builders.
//!
//! Every component that reads, writes, or invalidates a shared-cache entry
//! goes through [`CacheKey`], so two components can never disagree on a
//! key's spelling. Other services rely on these names for invalidation;
//! changing one is a breaking change.

use std::fmt;

use crate::types::DbId;

/// Version stamped into every JSON value written through
/// [`crate::cache::get_json`] / [`crate::cache::put_json`]. Bump it when a
/// cached payload changes shape; entries with another version read as misses.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Placeholder for an absent optional filter component.
const ANY: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `session-creation-lock:{user_id}`
    SessionLock { user_id: DbId },
    /// `session-idempotency:{user_id}:{token}`
    Idempotency { user_id: DbId, token: String },
    /// `questions:pool:subject:{s}:topic:{t}:subtopic:{st}`
    QuestionPool {
        subject_id: DbId,
        topic_id: Option<DbId>,
        subtopic_id: Option<DbId>,
    },
    /// `user:{user_id}:quota`
    UserQuota { user_id: DbId },
    /// `user:{user_id}:sessions`
    UserSessions { user_id: DbId },
    /// `health:check`, read by readiness checks. Never written.
    HealthCheck,
}

impl CacheKey {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::SessionLock { user_id } => write!(f, "session-creation-lock:{user_id}"),
            CacheKey::Idempotency { user_id, token } => {
                write!(f, "session-idempotency:{user_id}:{token}")
            }
            CacheKey::QuestionPool {
                subject_id,
                topic_id,
                subtopic_id,
            } => write!(
                f,
                "questions:pool:subject:{subject_id}:topic:{}:subtopic:{}",
                OptId(*topic_id),
                OptId(*subtopic_id)
            ),
            CacheKey::UserQuota { user_id } => write!(f, "user:{user_id}:quota"),
            CacheKey::UserSessions { user_id } => write!(f, "user:{user_id}:sessions"),
            CacheKey::HealthCheck => f.write_str("health:check"),
        }
    }
}

struct OptId(Option<DbId>);

impl fmt::Display for OptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id}"),
            None => f.write_str(ANY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key() {
        assert_eq!(
            CacheKey::SessionLock { user_id: 42 }.render(),
            "session-creation-lock:42"
        );
    }

    #[test]
    fn idempotency_key() {
        let key = CacheKey::Idempotency {
            user_id: 42,
            token: "abc-123".into(),
        };
        assert_eq!(key.render(), "session-idempotency:42:abc-123");
    }

    #[test]
    fn question_pool_key_with_all_filters() {
        let key = CacheKey::QuestionPool {
            subject_id: 1,
            topic_id: Some(2),
            subtopic_id: Some(3),
        };
        assert_eq!(key.render(), "questions:pool:subject:1:topic:2:subtopic:3");
    }

    #[test]
    fn question_pool_key_renders_missing_filters_as_all() {
        let key = CacheKey::QuestionPool {
            subject_id: 1,
            topic_id: None,
            subtopic_id: None,
        };
        assert_eq!(key.render(), "questions:pool:subject:1:topic:all:subtopic:all");
    }

    #[test]
    fn user_keys() {
        assert_eq!(CacheKey::UserQuota { user_id: 9 }.render(), "user:9:quota");
        assert_eq!(CacheKey::UserSessions { user_id: 9 }.render(), "user:9:sessions");
        assert_eq!(CacheKey::HealthCheck.render(), "health:check");
    }
}
