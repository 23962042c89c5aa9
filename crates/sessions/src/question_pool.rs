//! Cached candidate pools and freemium topic gating.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use examprep_core::cache::{self, SharedCache};
use examprep_core::error::SessionError;
use examprep_core::question::{QuestionCandidate, QuestionFilter, SubjectAccess};
use examprep_core::retry::RetryPolicy;
use examprep_core::selection::{self, DEFAULT_FREE_TOPIC_COUNT};
use examprep_core::storage::PracticeStore;
use examprep_core::types::DbId;

/// A subject's gating settings together with its topic ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectGate {
    pub access: SubjectAccess,
    /// Ascending. Empty when the subject is not gated.
    pub topic_ids: Vec<DbId>,
}

impl SubjectGate {
    /// An unknown subject has no gate; its pool will simply be empty.
    fn open(subject_id: DbId) -> Self {
        Self {
            access: SubjectAccess {
                subject_id,
                is_freemium: false,
                free_topic_count: DEFAULT_FREE_TOPIC_COUNT,
            },
            topic_ids: Vec::new(),
        }
    }

    pub fn allowed_topics(&self, user_is_premium: bool) -> Option<BTreeSet<DbId>> {
        selection::allowed_topics(&self.access, &self.topic_ids, user_is_premium)
    }

    pub fn apply_freemium_filter(
        &self,
        candidates: Vec<QuestionCandidate>,
        user_is_premium: bool,
        topic_requested: bool,
    ) -> Vec<QuestionCandidate> {
        selection::apply_freemium_filter(
            candidates,
            &self.access,
            &self.topic_ids,
            user_is_premium,
            topic_requested,
        )
    }
}

#[derive(Clone)]
pub struct QuestionPool {
    store: Arc<dyn PracticeStore>,
    cache: Arc<dyn SharedCache>,
    retry: RetryPolicy,
    ttl: Duration,
}

impl QuestionPool {
    pub fn new(
        store: Arc<dyn PracticeStore>,
        cache: Arc<dyn SharedCache>,
        retry: RetryPolicy,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            retry,
            ttl,
        }
    }

    /// Every valid question matching `filter`, served from the shared cache
    /// when possible.
    ///
    /// Rows whose payload does not validate are dropped with a warning. A
    /// cache failure degrades to a store read.
    pub async fn fetch_candidates(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<QuestionCandidate>, SessionError> {
        let key = filter.cache_key();
        match cache::get_json::<Vec<QuestionCandidate>>(self.cache.as_ref(), &key).await {
            Ok(Some(candidates)) => {
                tracing::debug!(%filter, count = candidates.len(), "Question pool cache hit");
                return Ok(candidates);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%filter, error = %e, "Question pool cache read failed"),
        }

        let store = &self.store;
        let rows = self
            .retry
            .run("list_questions", move |_| async move {
                store.list_questions(filter).await
            })
            .await?;

        let total = rows.len();
        let candidates: Vec<QuestionCandidate> = rows
            .into_iter()
            .filter_map(|row| {
                let question_id = row.question_id;
                QuestionCandidate::try_from(row)
                    .inspect_err(|e| {
                        tracing::warn!(question_id, error = %e, "Skipping question with invalid details");
                    })
                    .ok()
            })
            .collect();
        tracing::debug!(%filter, total, valid = candidates.len(), "Question pool loaded");

        // Concurrent refreshes may both write; either result is fine.
        if let Err(e) = cache::put_json(self.cache.as_ref(), &key, &candidates, self.ttl).await {
            tracing::warn!(%filter, error = %e, "Question pool cache write failed");
        }
        Ok(candidates)
    }

    /// Gating settings and topics of `subject_id`. Topics are only loaded
    /// for freemium subjects.
    pub async fn subject_gate(&self, subject_id: DbId) -> Result<SubjectGate, SessionError> {
        let store = &self.store;
        let Some(access) = self
            .retry
            .run("find_subject", move |_| async move {
                store.find_subject(subject_id).await
            })
            .await?
        else {
            tracing::debug!(subject_id, "Unknown subject; treating as ungated");
            return Ok(SubjectGate::open(subject_id));
        };

        if !access.is_freemium {
            return Ok(SubjectGate {
                access,
                topic_ids: Vec::new(),
            });
        }

        let topic_ids = self
            .retry
            .run("list_topic_ids", move |_| async move {
                store.list_topic_ids(subject_id).await
            })
            .await?;
        Ok(SubjectGate { access, topic_ids })
    }

    /// Topics of `subject_id` open to this user; `None` means all.
    pub async fn allowed_topics(
        &self,
        subject_id: DbId,
        user_is_premium: bool,
    ) -> Result<Option<BTreeSet<DbId>>, SessionError> {
        Ok(self
            .subject_gate(subject_id)
            .await?
            .allowed_topics(user_is_premium))
    }

    /// Drop the cached pool for `filter`, e.g. after editing the bank.
    pub async fn invalidate(&self, filter: &QuestionFilter) {
        if let Err(e) = self.cache.delete(&filter.cache_key().render()).await {
            tracing::warn!(%filter, error = %e, "Question pool invalidation failed");
        }
    }
}
