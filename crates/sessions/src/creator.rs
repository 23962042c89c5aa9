//! The session-creation coordinator.
//!
//! One creation per user runs at a time across all instances. The flow is:
//! idempotency fast path, per-user lock, idempotency re-check, quota check,
//! topic gate, candidate selection, and a single transaction that writes the
//! session, its question assignments, and the guarded quota increment. The
//! lock is released on every exit path.

use std::sync::Arc;

use tokio::time::Instant;

use examprep_core::cache::{SharedCache, TimedCache};
use examprep_core::cache_keys::CacheKey;
use examprep_core::error::SessionError;
use examprep_core::idempotency::{self, IdempotencyStore};
use examprep_core::lock::DistributedLock;
use examprep_core::practice_session::{CreateSessionRequest, SessionCreated};
use examprep_core::selection;
use examprep_core::storage::{CommitOutcome, NewPracticeSession, PracticeStore, StorageError};
use examprep_core::types::{DbId, Timestamp};
use validator::Validate;

use crate::question_pool::QuestionPool;
use crate::quota_ledger::QuotaLedger;
use crate::settings::SessionSettings;

pub struct SessionCreator {
    store: Arc<dyn PracticeStore>,
    cache: Arc<dyn SharedCache>,
    lock: DistributedLock,
    idempotency: IdempotencyStore,
    ledger: QuotaLedger,
    pool: QuestionPool,
    settings: SessionSettings,
    clock: fn() -> Timestamp,
}

impl SessionCreator {
    /// Wire the coordinator. Every cache call is bounded by
    /// `settings.cache_timeout`.
    pub fn new(
        store: Arc<dyn PracticeStore>,
        cache: Arc<dyn SharedCache>,
        settings: SessionSettings,
    ) -> Self {
        let cache: Arc<dyn SharedCache> = Arc::new(TimedCache::new(cache, settings.cache_timeout));
        Self {
            lock: DistributedLock::new(Arc::clone(&cache)),
            idempotency: IdempotencyStore::new(Arc::clone(&cache), settings.idempotency_ttl),
            ledger: QuotaLedger::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                settings.retry,
                settings.free_daily_limit,
                settings.quota_cache_ttl,
            ),
            pool: QuestionPool::new(
                Arc::clone(&store),
                Arc::clone(&cache),
                settings.retry,
                settings.question_pool_ttl,
            ),
            store,
            cache,
            settings,
            clock: chrono::Utc::now,
        }
    }

    /// Replace the wall clock, for day-boundary tests.
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    pub fn pool(&self) -> &QuestionPool {
        &self.pool
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn now(&self) -> Timestamp {
        (self.clock)()
    }

    /// Whether the shared cache answers a read within the cache timeout.
    /// Creation fails closed without it.
    pub async fn cache_healthy(&self) -> bool {
        match self.cache.get(&CacheKey::HealthCheck.render()).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Shared cache health check failed");
                false
            }
        }
    }

    /// Create a practice session for `request.user_id`.
    ///
    /// With an idempotency token, a repeat of an already-committed request
    /// returns the first result instead of booking another session.
    #[tracing::instrument(
        skip_all,
        fields(user_id = request.user_id, subject_id = request.subject_id)
    )]
    pub async fn create_session(
        &self,
        request: &CreateSessionRequest,
        idempotency_token: Option<&str>,
    ) -> Result<SessionCreated, SessionError> {
        request
            .validate()
            .map_err(|e| SessionError::InvalidRequest(e.to_string()))?;
        request
            .check_filter_shape()
            .map_err(SessionError::InvalidRequest)?;
        if let Some(token) = idempotency_token {
            idempotency::validate_token(token).map_err(SessionError::InvalidRequest)?;
            if let Some(replayed) = self.replay(request.user_id, token).await {
                return Ok(replayed);
            }
        }

        let user_id = request.user_id;
        // Taken before acquiring, so it never falls after the real expiry.
        let lock_deadline = Instant::now() + self.settings.lock_ttl;
        let guard = match self
            .lock
            .acquire(&CacheKey::SessionLock { user_id }, self.settings.lock_ttl)
            .await
        {
            Ok(Some(guard)) => guard,
            Ok(None) => return Err(SessionError::LockContention { user_id }),
            Err(e) => {
                tracing::error!(error = %e, "Session lock unavailable");
                return Err(SessionError::CacheUnavailable(e.to_string()));
            }
        };

        let result = self
            .create_locked(request, idempotency_token, lock_deadline)
            .await;

        if let Err(e) = guard.release().await {
            tracing::warn!(error = %e, "Session lock release failed; it will expire");
        }
        result
    }

    async fn create_locked(
        &self,
        request: &CreateSessionRequest,
        idempotency_token: Option<&str>,
        lock_deadline: Instant,
    ) -> Result<SessionCreated, SessionError> {
        let user_id = request.user_id;

        // The previous holder may have committed this very request.
        if let Some(token) = idempotency_token {
            if let Some(replayed) = self.replay(user_id, token).await {
                return Ok(replayed);
            }
        }

        let now = self.now();
        let (quota, evaluation) = self.ledger.check(user_id, now).await?;
        if !evaluation.can_take {
            let denial = evaluation
                .reason
                .unwrap_or_else(|| self.ledger.exhausted(&quota, now));
            tracing::info!(used_today = quota.used_today, "Daily quota exhausted");
            return Err(SessionError::QuotaExceeded(denial));
        }

        let premium = quota.is_premium();
        let gate = self.pool.subject_gate(request.subject_id).await?;
        if let Some(topic_id) = request.topic_id {
            if let Some(allowed) = gate.allowed_topics(premium) {
                if !allowed.contains(&topic_id) {
                    return Err(SessionError::TopicAccessDenied {
                        subject_id: request.subject_id,
                        topic_id,
                    });
                }
            }
        }

        let filter = request.filter();
        let candidates = self.pool.fetch_candidates(&filter).await?;
        let candidates = gate.apply_freemium_filter(candidates, premium, request.topic_id.is_some());
        let count = usize::try_from(request.question_count).unwrap_or(0);
        let selected = selection::select_random(candidates, count)
            .map_err(|_| SessionError::NoQuestionsAvailable { filter })?;

        let new_session = NewPracticeSession {
            user_id,
            subject_id: request.subject_id,
            topic_id: request.topic_id,
            subtopic_id: request.subtopic_id,
            question_ids: selected.iter().map(|c| c.question_id).collect(),
            usage_day: now.date_naive(),
            started_at: now,
        };

        let committed = match self.commit(&new_session, lock_deadline).await? {
            CommitOutcome::Committed(committed) => committed,
            CommitOutcome::QuotaExhausted => {
                tracing::info!("Quota filled up before commit");
                return Err(SessionError::QuotaExceeded(self.ledger.exhausted(&quota, now)));
            }
        };

        let created = SessionCreated {
            session_id: committed.session_id,
            questions: selected,
        };

        // From here on the session exists; cache trouble is only logged.
        if let Some(token) = idempotency_token {
            if let Err(e) = self.idempotency.put(user_id, token, &created).await {
                tracing::warn!(error = %e, "Idempotency record write failed");
            }
        }
        self.invalidate_user(user_id).await;

        tracing::info!(
            session_id = created.session_id,
            total_questions = committed.total_questions,
            "Practice session created"
        );
        Ok(created)
    }

    /// The creation transaction under retry, each attempt bounded by the
    /// transaction timeout. A timed-out attempt is not retried: it may
    /// still commit.
    ///
    /// Every attempt must end before `lock_deadline`. Past it another
    /// request for the same token can take the lock and commit again.
    async fn commit(
        &self,
        new_session: &NewPracticeSession,
        lock_deadline: Instant,
    ) -> Result<CommitOutcome, SessionError> {
        let store = &self.store;
        let timeout = self.settings.transaction_timeout;
        self.settings
            .retry
            .run_until("commit_session", lock_deadline, timeout, move |attempt| async move {
                let budget = timeout.min(lock_deadline.saturating_duration_since(Instant::now()));
                match tokio::time::timeout(budget, store.commit_session(new_session)).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!(attempt, timeout_ms = budget.as_millis() as u64, "Session transaction timed out");
                        Err(StorageError::Fatal(format!(
                            "session transaction timed out after {budget:?}"
                        )))
                    }
                }
            })
            .await
            .map_err(SessionError::from)
    }

    async fn replay(&self, user_id: DbId, token: &str) -> Option<SessionCreated> {
        match self.idempotency.get::<SessionCreated>(user_id, token).await {
            Ok(Some(created)) => {
                tracing::info!(user_id, session_id = created.session_id, "Replaying idempotent session creation");
                Some(created)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Idempotency lookup failed");
                None
            }
        }
    }

    async fn invalidate_user(&self, user_id: DbId) {
        self.ledger.invalidate(user_id).await;
        let sessions_key = CacheKey::UserSessions { user_id }.render();
        if let Err(e) = self.cache.delete(&sessions_key).await {
            tracing::warn!(user_id, error = %e, "Session list invalidation failed");
        }
    }
}
