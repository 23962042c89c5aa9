//! Freemium gating and random selection of session questions.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::question::{QuestionCandidate, SubjectAccess};
use crate::types::DbId;

/// Topics of a freemium subject visible to free users, when the subject
/// row does not say otherwise.
pub const DEFAULT_FREE_TOPIC_COUNT: i32 = 2;

/// The candidate pool was empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no questions available")]
pub struct NoQuestionsAvailable;

/// Topics a user may practise within `subject`.
///
/// `None` means unrestricted: the subject is not gated or the user is
/// premium. Otherwise the set holds the first `free_topic_count` entries of
/// `topic_ids` in ascending id order.
pub fn allowed_topics(
    subject: &SubjectAccess,
    topic_ids: &[DbId],
    user_is_premium: bool,
) -> Option<BTreeSet<DbId>> {
    if !subject.is_freemium || user_is_premium {
        return None;
    }
    let count = usize::try_from(subject.free_topic_count).unwrap_or(0);
    let ordered: BTreeSet<DbId> = topic_ids.iter().copied().collect();
    Some(ordered.into_iter().take(count).collect())
}

/// Restrict an unfiltered pool of a gated subject to the free topics.
///
/// Only applies when no explicit topic was requested; an explicit topic is
/// checked against [`allowed_topics`] up front instead.
pub fn apply_freemium_filter(
    candidates: Vec<QuestionCandidate>,
    subject: &SubjectAccess,
    topic_ids: &[DbId],
    user_is_premium: bool,
    topic_requested: bool,
) -> Vec<QuestionCandidate> {
    if topic_requested {
        return candidates;
    }
    match allowed_topics(subject, topic_ids, user_is_premium) {
        Some(allowed) => candidates
            .into_iter()
            .filter(|c| allowed.contains(&c.topic_id))
            .collect(),
        None => candidates,
    }
}

/// Uniformly shuffle `candidates` and keep the first `n`.
///
/// Returns everything when fewer than `n` are available.
pub fn select_random(
    candidates: Vec<QuestionCandidate>,
    n: usize,
) -> Result<Vec<QuestionCandidate>, NoQuestionsAvailable> {
    select_random_with(candidates, n, &mut rand::rng())
}

pub fn select_random_with<R: Rng + ?Sized>(
    mut candidates: Vec<QuestionCandidate>,
    n: usize,
    rng: &mut R,
) -> Result<Vec<QuestionCandidate>, NoQuestionsAvailable> {
    if candidates.is_empty() {
        return Err(NoQuestionsAvailable);
    }
    candidates.shuffle(rng);
    candidates.truncate(n);
    Ok(candidates)
}
