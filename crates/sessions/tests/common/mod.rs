//! Shared fixtures for coordinator integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use examprep_core::cache::{CacheError, MemoryCache, SharedCache};
use examprep_core::error::SessionError;
use examprep_core::practice_session::{CreateSessionRequest, SessionCreated};
use examprep_core::question::{QuestionFilter, QuestionRow, SubjectAccess};
use examprep_core::quota::QuotaRecord;
use examprep_core::retry::RetryPolicy;
use examprep_core::storage::{CommitOutcome, NewPracticeSession, PracticeStore, StorageError};
use examprep_core::types::{DbId, UtcDay};
use examprep_sessions::memory::MemoryPracticeStore;
use examprep_sessions::{SessionCreator, SessionSettings};

pub const SUBJECT: DbId = 1;
pub const GATED_SUBJECT: DbId = 2;

/// Settings with no retry delays and short timeouts.
pub fn test_settings() -> SessionSettings {
    SessionSettings {
        retry: RetryPolicy::immediate(3),
        cache_timeout: Duration::from_secs(1),
        transaction_timeout: Duration::from_secs(5),
        ..SessionSettings::default()
    }
}

pub fn question(question_id: DbId, topic_id: DbId) -> QuestionRow {
    QuestionRow {
        question_id,
        topic_id,
        subtopic_id: None,
        marks: 2,
        question_type: "multiple_choice".into(),
        details: serde_json::json!({
            "prompt": format!("Question {question_id}"),
            "options": ["a", "b", "c"],
            "correct_option": 1,
        }),
    }
}

/// `SUBJECT` is ungated with topics 10 and 11 holding questions 100..=104.
/// `GATED_SUBJECT` is freemium with one free topic out of 20, 21, 22,
/// one question each (200, 210, 220).
pub fn seeded_store() -> Arc<MemoryPracticeStore> {
    let store = Arc::new(MemoryPracticeStore::new());

    store.add_subject(SubjectAccess {
        subject_id: SUBJECT,
        is_freemium: false,
        free_topic_count: 2,
    });
    store.add_topic(SUBJECT, 10);
    store.add_topic(SUBJECT, 11);
    for id in 100..=102 {
        store.add_question(SUBJECT, question(id, 10));
    }
    for id in 103..=104 {
        store.add_question(SUBJECT, question(id, 11));
    }

    store.add_subject(SubjectAccess {
        subject_id: GATED_SUBJECT,
        is_freemium: true,
        free_topic_count: 1,
    });
    for (topic_id, question_id) in [(22, 220), (20, 200), (21, 210)] {
        store.add_topic(GATED_SUBJECT, topic_id);
        store.add_question(GATED_SUBJECT, question(question_id, topic_id));
    }

    store
}

pub fn today() -> UtcDay {
    Utc::now().date_naive()
}

pub fn request(user_id: DbId, question_count: i32) -> CreateSessionRequest {
    CreateSessionRequest {
        user_id,
        subject_id: SUBJECT,
        topic_id: None,
        subtopic_id: None,
        question_count,
    }
}

pub fn creator(store: Arc<dyn PracticeStore>, cache: Arc<dyn SharedCache>) -> SessionCreator {
    SessionCreator::new(store, cache, test_settings())
}

/// Keep calling until the lock is free, like a well-behaved client.
pub async fn create_with_backoff(
    creator: &SessionCreator,
    request: &CreateSessionRequest,
    token: Option<&str>,
) -> Result<SessionCreated, SessionError> {
    for _ in 0..500 {
        match creator.create_session(request, token).await {
            Err(SessionError::LockContention { .. }) => {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            other => return other,
        }
    }
    panic!("lock never became free");
}

pub fn premium(user_id: DbId) -> QuotaRecord {
    QuotaRecord {
        plan_tier: examprep_core::quota::PlanTier::Premium,
        plan_limit: None,
        ..QuotaRecord::new_free(user_id, 3, today())
    }
}

// ---------------------------------------------------------------------------
// Fault-injecting store
// ---------------------------------------------------------------------------

/// Wraps the in-memory store with scripted commit failures and latency.
pub struct FlakyStore {
    pub inner: Arc<MemoryPracticeStore>,
    transient_failures: AtomicUsize,
    commit_delay: Duration,
    pub commit_attempts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryPracticeStore>) -> Self {
        Self {
            inner,
            transient_failures: AtomicUsize::new(0),
            commit_delay: Duration::ZERO,
            commit_attempts: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` commits with a transient error.
    pub fn failing_commits(self, n: usize) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_commit_delay(mut self, delay: Duration) -> Self {
        self.commit_delay = delay;
        self
    }

    pub fn attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PracticeStore for FlakyStore {
    async fn find_quota(&self, user_id: DbId) -> Result<Option<QuotaRecord>, StorageError> {
        self.inner.find_quota(user_id).await
    }

    async fn insert_quota_if_absent(
        &self,
        record: &QuotaRecord,
    ) -> Result<QuotaRecord, StorageError> {
        self.inner.insert_quota_if_absent(record).await
    }

    async fn reset_daily_usage(
        &self,
        user_id: DbId,
        today: UtcDay,
    ) -> Result<Option<QuotaRecord>, StorageError> {
        self.inner.reset_daily_usage(user_id, today).await
    }

    async fn find_subject(&self, subject_id: DbId) -> Result<Option<SubjectAccess>, StorageError> {
        self.inner.find_subject(subject_id).await
    }

    async fn list_topic_ids(&self, subject_id: DbId) -> Result<Vec<DbId>, StorageError> {
        self.inner.list_topic_ids(subject_id).await
    }

    async fn list_questions(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<QuestionRow>, StorageError> {
        self.inner.list_questions(filter).await
    }

    async fn commit_session(
        &self,
        session: &NewPracticeSession,
    ) -> Result<CommitOutcome, StorageError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.commit_delay.is_zero() {
            tokio::time::sleep(self.commit_delay).await;
        }
        let failed = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StorageError::Transient("connection terminated".into()));
        }
        self.inner.commit_session(session).await
    }
}

// ---------------------------------------------------------------------------
// Broken cache
// ---------------------------------------------------------------------------

/// A shared cache whose backend is unreachable.
pub struct DownCache;

#[async_trait]
impl SharedCache for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn set_if_absent(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }

    async fn delete_if_equals(&self, _key: &str, _expected: &str) -> Result<bool, CacheError> {
        Err(CacheError::Backend("connection refused".into()))
    }
}

pub fn memory_cache() -> Arc<MemoryCache> {
    Arc::new(MemoryCache::new())
}
