//! Per-user daily quota: lazy creation, lazy UTC-day rollover, evaluation,
//! and the cached status read path.
//!
//! The increment itself is not here: it runs inside the creation
//! transaction (see [`PracticeStore::commit_session`]) guarded by
//! `plan_limit IS NULL OR used_today < plan_limit`.

use std::sync::Arc;
use std::time::Duration;

use examprep_core::cache::{self, SharedCache};
use examprep_core::cache_keys::CacheKey;
use examprep_core::error::SessionError;
use examprep_core::quota::{self, PlanTier, QuotaDenial, QuotaEvaluation, QuotaRecord};
use examprep_core::retry::RetryPolicy;
use examprep_core::storage::PracticeStore;
use examprep_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};

/// Evaluated quota as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub plan_tier: PlanTier,
    pub plan_limit: Option<i32>,
    pub used_today: i32,
    pub remaining: Option<i32>,
    pub can_take: bool,
    pub resets_at: Timestamp,
    pub reason: Option<QuotaDenial>,
}

impl QuotaStatus {
    fn from_evaluation(record: &QuotaRecord, evaluation: QuotaEvaluation, now: Timestamp) -> Self {
        Self {
            plan_tier: record.plan_tier,
            plan_limit: record.plan_limit,
            used_today: record.used_today,
            remaining: evaluation.remaining,
            can_take: evaluation.can_take,
            resets_at: quota::next_reset(now),
            reason: evaluation.reason,
        }
    }
}

#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn PracticeStore>,
    cache: Arc<dyn SharedCache>,
    retry: RetryPolicy,
    free_daily_limit: i32,
    status_ttl: Duration,
}

impl QuotaLedger {
    pub fn new(
        store: Arc<dyn PracticeStore>,
        cache: Arc<dyn SharedCache>,
        retry: RetryPolicy,
        free_daily_limit: i32,
        status_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            retry,
            free_daily_limit,
            status_ttl,
        }
    }

    /// The user's record, creating a free-tier one on first use.
    pub async fn get_or_create(
        &self,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<QuotaRecord, SessionError> {
        let store = &self.store;
        if let Some(record) = self
            .retry
            .run("find_quota", move |_| async move { store.find_quota(user_id).await })
            .await?
        {
            return Ok(record);
        }

        let fresh = QuotaRecord::new_free(user_id, self.free_daily_limit, now.date_naive());
        let fresh = &fresh;
        let record = self
            .retry
            .run("insert_quota", move |_| async move {
                store.insert_quota_if_absent(fresh).await
            })
            .await?;
        tracing::info!(user_id, plan_limit = ?record.plan_limit, "Quota record created");
        Ok(record)
    }

    /// Roll `record` over to `now`'s UTC day, persisting the reset when the
    /// day changed.
    pub async fn reset_if_new_day(
        &self,
        mut record: QuotaRecord,
        now: Timestamp,
    ) -> Result<QuotaRecord, SessionError> {
        if !quota::reset_if_new_day(&mut record, now) {
            return Ok(record);
        }

        let store = &self.store;
        let user_id = record.user_id;
        let today = record.last_usage_day;
        let persisted = self
            .retry
            .run("reset_daily_usage", move |_| async move {
                store.reset_daily_usage(user_id, today).await
            })
            .await?;
        tracing::debug!(user_id, %today, "Daily quota reset");

        // Another instance may have booked a session for today between our
        // read and the reset; the stored row wins.
        Ok(persisted.unwrap_or(record))
    }

    pub fn evaluate(&self, record: &QuotaRecord, now: Timestamp) -> QuotaEvaluation {
        quota::evaluate(record, now)
    }

    /// `get_or_create`, `reset_if_new_day`, and `evaluate` in one step.
    pub async fn check(
        &self,
        user_id: DbId,
        now: Timestamp,
    ) -> Result<(QuotaRecord, QuotaEvaluation), SessionError> {
        let record = self.get_or_create(user_id, now).await?;
        let record = self.reset_if_new_day(record, now).await?;
        let evaluation = self.evaluate(&record, now);
        Ok((record, evaluation))
    }

    /// Cached evaluated quota for display.
    pub async fn status(&self, user_id: DbId, now: Timestamp) -> Result<QuotaStatus, SessionError> {
        let key = CacheKey::UserQuota { user_id };
        match cache::get_json::<QuotaStatus>(self.cache.as_ref(), &key).await {
            // A cached status from before midnight is stale.
            Ok(Some(status)) if status.resets_at > now => return Ok(status),
            Ok(_) => {}
            Err(e) => tracing::warn!(user_id, error = %e, "Quota status cache read failed"),
        }

        let (record, evaluation) = self.check(user_id, now).await?;
        let status = QuotaStatus::from_evaluation(&record, evaluation, now);
        if let Err(e) = cache::put_json(self.cache.as_ref(), &key, &status, self.status_ttl).await {
            tracing::warn!(user_id, error = %e, "Quota status cache write failed");
        }
        Ok(status)
    }

    /// Drop the cached status so the next read reflects a new booking.
    pub async fn invalidate(&self, user_id: DbId) {
        let key = CacheKey::UserQuota { user_id }.render();
        if let Err(e) = self.cache.delete(&key).await {
            tracing::warn!(user_id, error = %e, "Quota status invalidation failed");
        }
    }

    /// The denial to report when the guarded increment found no room.
    pub fn exhausted(&self, record: &QuotaRecord, now: Timestamp) -> QuotaDenial {
        QuotaDenial {
            limit: record.plan_limit.unwrap_or(self.free_daily_limit),
            resets_at: quota::next_reset(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryPracticeStore;
    use chrono::{TimeZone, Utc};
    use examprep_core::cache::MemoryCache;

    fn ledger(store: Arc<MemoryPracticeStore>) -> QuotaLedger {
        QuotaLedger::new(
            store,
            Arc::new(MemoryCache::new()),
            RetryPolicy::immediate(3),
            3,
            Duration::from_secs(60),
        )
    }

    fn at(day: u32, hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn first_use_creates_free_record() {
        let store = Arc::new(MemoryPracticeStore::new());
        let ledger = ledger(store.clone());

        let record = ledger.get_or_create(5, at(17, 9)).await.unwrap();
        assert_eq!(record.plan_limit, Some(3));
        assert_eq!(record.used_today, 0);
        assert_eq!(store.quota(5), Some(record));
    }

    #[tokio::test]
    async fn yesterday_usage_is_reset_before_evaluation() {
        let store = Arc::new(MemoryPracticeStore::new());
        store.set_quota(QuotaRecord {
            used_today: 3,
            ..QuotaRecord::new_free(7, 3, at(16, 20).date_naive())
        });
        let ledger = ledger(store.clone());

        let (record, evaluation) = ledger.check(7, at(17, 8)).await.unwrap();
        assert_eq!(record.used_today, 0);
        assert!(evaluation.can_take);
        assert_eq!(evaluation.remaining, Some(3));
        assert_eq!(store.quota(7).unwrap().used_today, 0);
    }

    #[tokio::test]
    async fn exhausted_free_user_gets_reason_with_next_midnight() {
        let store = Arc::new(MemoryPracticeStore::new());
        store.set_quota(QuotaRecord {
            used_today: 3,
            ..QuotaRecord::new_free(8, 3, at(17, 1).date_naive())
        });
        let ledger = ledger(store);

        let (_, evaluation) = ledger.check(8, at(17, 15)).await.unwrap();
        assert!(!evaluation.can_take);
        let reason = evaluation.reason.unwrap();
        assert_eq!(reason.limit, 3);
        assert_eq!(reason.resets_at, at(18, 0));
        assert!(reason.to_string().contains('3'));
        assert!(reason.to_string().contains("2026-10-18T00:00:00"));
    }

    #[tokio::test]
    async fn status_is_cached_until_invalidated() {
        let store = Arc::new(MemoryPracticeStore::new());
        let ledger = ledger(store.clone());
        let now = at(17, 10);

        let first = ledger.status(9, now).await.unwrap();
        assert_eq!(first.remaining, Some(3));

        store.set_quota(QuotaRecord {
            used_today: 2,
            ..QuotaRecord::new_free(9, 3, now.date_naive())
        });
        assert_eq!(ledger.status(9, now).await.unwrap(), first);

        ledger.invalidate(9).await;
        assert_eq!(ledger.status(9, now).await.unwrap().remaining, Some(1));
    }
}
