//! In-process [`PracticeStore`] for tests and single-process development.
//!
//! All state sits behind one mutex, so `commit_session` is trivially
//! all-or-nothing: it validates everything before touching any table.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use examprep_core::question::{QuestionFilter, QuestionRow, SubjectAccess};
use examprep_core::quota::QuotaRecord;
use examprep_core::storage::{
    CommitOutcome, CommittedSession, NewPracticeSession, PracticeStore, StorageError,
};
use examprep_core::types::{DbId, Timestamp, UtcDay};

/// A stored practice-session row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub id: DbId,
    pub user_id: DbId,
    pub subject_id: DbId,
    pub topic_id: Option<DbId>,
    pub subtopic_id: Option<DbId>,
    pub total_questions: i32,
    pub max_score: i32,
    pub is_completed: bool,
    pub start_time: Timestamp,
}

#[derive(Default)]
struct State {
    quotas: HashMap<DbId, QuotaRecord>,
    subjects: HashMap<DbId, SubjectAccess>,
    /// topic id -> subject id
    topics: BTreeMap<DbId, DbId>,
    /// (subject id, row)
    questions: Vec<(DbId, QuestionRow)>,
    sessions: Vec<StoredSession>,
    /// (session id, question id, order)
    assignments: Vec<(DbId, DbId, i32)>,
    commits: usize,
}

#[derive(Default)]
pub struct MemoryPracticeStore {
    state: Mutex<State>,
}

impl MemoryPracticeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- seeding ------------------------------------------------------------

    pub fn add_subject(&self, access: SubjectAccess) {
        self.lock().subjects.insert(access.subject_id, access);
    }

    pub fn add_topic(&self, subject_id: DbId, topic_id: DbId) {
        self.lock().topics.insert(topic_id, subject_id);
    }

    pub fn add_question(&self, subject_id: DbId, row: QuestionRow) {
        self.lock().questions.push((subject_id, row));
    }

    pub fn set_quota(&self, record: QuotaRecord) {
        self.lock().quotas.insert(record.user_id, record);
    }

    // -- inspection ---------------------------------------------------------

    pub fn quota(&self, user_id: DbId) -> Option<QuotaRecord> {
        self.lock().quotas.get(&user_id).cloned()
    }

    pub fn sessions(&self) -> Vec<StoredSession> {
        self.lock().sessions.clone()
    }

    /// `(question_id, order)` pairs of a session, in insertion order.
    pub fn assignments(&self, session_id: DbId) -> Vec<(DbId, i32)> {
        self.lock()
            .assignments
            .iter()
            .filter(|(sid, _, _)| *sid == session_id)
            .map(|(_, qid, order)| (*qid, *order))
            .collect()
    }

    /// Number of `commit_session` calls that reached the store.
    pub fn commit_calls(&self) -> usize {
        self.lock().commits
    }
}

#[async_trait]
impl PracticeStore for MemoryPracticeStore {
    async fn find_quota(&self, user_id: DbId) -> Result<Option<QuotaRecord>, StorageError> {
        Ok(self.quota(user_id))
    }

    async fn insert_quota_if_absent(
        &self,
        record: &QuotaRecord,
    ) -> Result<QuotaRecord, StorageError> {
        let mut state = self.lock();
        Ok(state
            .quotas
            .entry(record.user_id)
            .or_insert_with(|| record.clone())
            .clone())
    }

    async fn reset_daily_usage(
        &self,
        user_id: DbId,
        today: UtcDay,
    ) -> Result<Option<QuotaRecord>, StorageError> {
        let mut state = self.lock();
        Ok(state.quotas.get_mut(&user_id).map(|record| {
            if record.last_usage_day != today {
                record.used_today = 0;
                record.last_usage_day = today;
            }
            record.clone()
        }))
    }

    async fn find_subject(&self, subject_id: DbId) -> Result<Option<SubjectAccess>, StorageError> {
        Ok(self.lock().subjects.get(&subject_id).copied())
    }

    async fn list_topic_ids(&self, subject_id: DbId) -> Result<Vec<DbId>, StorageError> {
        Ok(self
            .lock()
            .topics
            .iter()
            .filter(|(_, owner)| **owner == subject_id)
            .map(|(topic_id, _)| *topic_id)
            .collect())
    }

    async fn list_questions(
        &self,
        filter: &QuestionFilter,
    ) -> Result<Vec<QuestionRow>, StorageError> {
        Ok(self
            .lock()
            .questions
            .iter()
            .filter(|(subject_id, row)| {
                *subject_id == filter.subject_id
                    && filter.topic_id.is_none_or(|t| row.topic_id == t)
                    && filter.subtopic_id.is_none_or(|s| row.subtopic_id == Some(s))
            })
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn commit_session(
        &self,
        session: &NewPracticeSession,
    ) -> Result<CommitOutcome, StorageError> {
        let mut state = self.lock();
        state.commits += 1;

        let unknown = session.question_ids.iter().find(|id| {
            !state
                .questions
                .iter()
                .any(|(_, row)| row.question_id == **id)
        });
        if let Some(id) = unknown {
            return Err(StorageError::Fatal(format!(
                "question {id} does not exist"
            )));
        }

        let Some(quota) = state.quotas.get_mut(&session.user_id) else {
            return Ok(CommitOutcome::QuotaExhausted);
        };
        if quota.last_usage_day != session.usage_day {
            quota.used_today = 0;
            quota.last_usage_day = session.usage_day;
        }
        if quota.plan_limit.is_some_and(|limit| quota.used_today >= limit) {
            return Ok(CommitOutcome::QuotaExhausted);
        }
        quota.used_today += 1;
        quota.total_used += 1;

        let id = DbId::try_from(state.sessions.len()).unwrap_or(DbId::MAX) + 1;
        let total_questions = session.total_questions();
        state.sessions.push(StoredSession {
            id,
            user_id: session.user_id,
            subject_id: session.subject_id,
            topic_id: session.topic_id,
            subtopic_id: session.subtopic_id,
            total_questions,
            max_score: total_questions,
            is_completed: false,
            start_time: session.started_at,
        });
        for (order, question_id) in (1..).zip(&session.question_ids) {
            state.assignments.push((id, *question_id, order));
        }

        Ok(CommitOutcome::Committed(CommittedSession {
            session_id: id,
            total_questions,
            max_score: total_questions,
            start_time: session.started_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn row(question_id: DbId, topic_id: DbId) -> QuestionRow {
        QuestionRow {
            question_id,
            topic_id,
            subtopic_id: None,
            marks: 1,
            question_type: "true_false".into(),
            details: serde_json::json!({"prompt": "?", "answer": true}),
        }
    }

    fn new_session(user_id: DbId, question_ids: Vec<DbId>) -> NewPracticeSession {
        let now = Utc::now();
        NewPracticeSession {
            user_id,
            subject_id: 1,
            topic_id: None,
            subtopic_id: None,
            question_ids,
            usage_day: now.date_naive(),
            started_at: now,
        }
    }

    #[tokio::test]
    async fn commit_books_quota_and_orders_assignments() {
        let store = MemoryPracticeStore::new();
        store.add_question(1, row(10, 1));
        store.add_question(1, row(11, 1));
        store.set_quota(QuotaRecord::new_free(1, 3, Utc::now().date_naive()));

        let outcome = store.commit_session(&new_session(1, vec![11, 10])).await.unwrap();
        let committed = assert_matches!(outcome, CommitOutcome::Committed(c) => c);
        assert_eq!(committed.max_score, 2);
        assert_eq!(store.assignments(committed.session_id), vec![(11, 1), (10, 2)]);
        assert_eq!(store.quota(1).unwrap().used_today, 1);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_trace() {
        let store = MemoryPracticeStore::new();
        store.add_question(1, row(10, 1));
        store.set_quota(QuotaRecord::new_free(1, 3, Utc::now().date_naive()));

        let result = store.commit_session(&new_session(1, vec![10, 99])).await;
        assert_matches!(result, Err(StorageError::Fatal(_)));
        assert!(store.sessions().is_empty());
        assert_eq!(store.quota(1).unwrap().used_today, 0);
    }

    #[tokio::test]
    async fn full_quota_is_reported_not_written() {
        let store = MemoryPracticeStore::new();
        store.add_question(1, row(10, 1));
        store.set_quota(QuotaRecord {
            used_today: 1,
            ..QuotaRecord::new_free(1, 1, Utc::now().date_naive())
        });

        let outcome = store.commit_session(&new_session(1, vec![10])).await.unwrap();
        assert_eq!(outcome, CommitOutcome::QuotaExhausted);
        assert!(store.sessions().is_empty());
    }

    #[tokio::test]
    async fn filters_match_exact_tuple() {
        let store = MemoryPracticeStore::new();
        store.add_question(1, row(10, 1));
        store.add_question(1, QuestionRow { subtopic_id: Some(5), ..row(11, 1) });
        store.add_question(1, row(12, 2));
        store.add_question(2, row(13, 3));

        let by = |topic_id, subtopic_id| QuestionFilter { subject_id: 1, topic_id, subtopic_id };
        assert_eq!(store.list_questions(&by(None, None)).await.unwrap().len(), 3);
        assert_eq!(store.list_questions(&by(Some(1), None)).await.unwrap().len(), 2);
        assert_eq!(store.list_questions(&by(Some(1), Some(5))).await.unwrap().len(), 1);
    }
}
