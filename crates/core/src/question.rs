//! Question projections used for session assembly.
//!
//! Questions are stored with a free-form `details` JSON column whose shape
//! depends on `question_type`. [`QuestionDetails`] is the typed form; rows
//! are parsed and validated once, when they enter the question pool, so
//! nothing downstream has to second-guess the payload.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache_keys::CacheKey;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Filters and subject access
// ---------------------------------------------------------------------------

/// The exact filter tuple a session is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionFilter {
    pub subject_id: DbId,
    pub topic_id: Option<DbId>,
    pub subtopic_id: Option<DbId>,
}

impl QuestionFilter {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::QuestionPool {
            subject_id: self.subject_id,
            topic_id: self.topic_id,
            subtopic_id: self.subtopic_id,
        }
    }
}

impl fmt::Display for QuestionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject {}", self.subject_id)?;
        if let Some(topic_id) = self.topic_id {
            write!(f, ", topic {topic_id}")?;
        }
        if let Some(subtopic_id) = self.subtopic_id {
            write!(f, ", subtopic {subtopic_id}")?;
        }
        Ok(())
    }
}

/// Freemium gating settings of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectAccess {
    pub subject_id: DbId,
    pub is_freemium: bool,
    /// How many of the subject's topics (lowest ids first) free users see.
    pub free_topic_count: i32,
}

// ---------------------------------------------------------------------------
// Details payloads
// ---------------------------------------------------------------------------

/// Type-specific question content, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionDetails {
    MultipleChoice {
        prompt: String,
        options: Vec<String>,
        correct_option: usize,
    },
    MultipleSelect {
        prompt: String,
        options: Vec<String>,
        correct_options: Vec<usize>,
    },
    TrueFalse {
        prompt: String,
        answer: bool,
    },
    Numeric {
        prompt: String,
        answer: f64,
        #[serde(default)]
        tolerance: f64,
    },
    ShortAnswer {
        prompt: String,
        accepted_answers: Vec<String>,
    },
}

/// Why a stored question payload was rejected.
#[derive(Debug, thiserror::Error)]
pub enum QuestionPayloadError {
    #[error("details for question type '{question_type}' must be a JSON object")]
    NotAnObject { question_type: String },

    #[error("malformed details for question type '{question_type}': {source}")]
    Malformed {
        question_type: String,
        source: serde_json::Error,
    },

    #[error("invalid question: {0}")]
    Invalid(String),
}

impl QuestionDetails {
    /// Parse a stored `(question_type, details)` pair and validate it.
    pub fn from_parts(
        question_type: &str,
        details: &serde_json::Value,
    ) -> Result<Self, QuestionPayloadError> {
        let mut object = details
            .as_object()
            .cloned()
            .ok_or_else(|| QuestionPayloadError::NotAnObject {
                question_type: question_type.to_string(),
            })?;
        object.insert(
            "type".to_string(),
            serde_json::Value::String(question_type.to_string()),
        );

        let parsed: QuestionDetails = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|source| QuestionPayloadError::Malformed {
                question_type: question_type.to_string(),
                source,
            })?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn prompt(&self) -> &str {
        match self {
            QuestionDetails::MultipleChoice { prompt, .. }
            | QuestionDetails::MultipleSelect { prompt, .. }
            | QuestionDetails::TrueFalse { prompt, .. }
            | QuestionDetails::Numeric { prompt, .. }
            | QuestionDetails::ShortAnswer { prompt, .. } => prompt,
        }
    }

    fn validate(&self) -> Result<(), QuestionPayloadError> {
        if self.prompt().trim().is_empty() {
            return Err(QuestionPayloadError::Invalid("prompt is empty".into()));
        }
        match self {
            QuestionDetails::MultipleChoice {
                options,
                correct_option,
                ..
            } => {
                check_options(options)?;
                if *correct_option >= options.len() {
                    return Err(QuestionPayloadError::Invalid(format!(
                        "correct_option {correct_option} out of range for {} options",
                        options.len()
                    )));
                }
            }
            QuestionDetails::MultipleSelect {
                options,
                correct_options,
                ..
            } => {
                check_options(options)?;
                if correct_options.is_empty() {
                    return Err(QuestionPayloadError::Invalid(
                        "correct_options is empty".into(),
                    ));
                }
                if let Some(bad) = correct_options.iter().find(|&&i| i >= options.len()) {
                    return Err(QuestionPayloadError::Invalid(format!(
                        "correct option {bad} out of range for {} options",
                        options.len()
                    )));
                }
            }
            QuestionDetails::Numeric {
                answer, tolerance, ..
            } => {
                if !answer.is_finite() || !tolerance.is_finite() || *tolerance < 0.0 {
                    return Err(QuestionPayloadError::Invalid(
                        "numeric answer and tolerance must be finite, tolerance >= 0".into(),
                    ));
                }
            }
            QuestionDetails::ShortAnswer {
                accepted_answers, ..
            } => {
                if accepted_answers.iter().all(|a| a.trim().is_empty()) {
                    return Err(QuestionPayloadError::Invalid(
                        "no accepted answers".into(),
                    ));
                }
            }
            QuestionDetails::TrueFalse { .. } => {}
        }
        Ok(())
    }
}

fn check_options(options: &[String]) -> Result<(), QuestionPayloadError> {
    if options.len() < 2 {
        return Err(QuestionPayloadError::Invalid(format!(
            "expected at least 2 options, got {}",
            options.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rows and candidates
// ---------------------------------------------------------------------------

/// A question as read from storage, before payload validation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionRow {
    pub question_id: DbId,
    pub topic_id: DbId,
    pub subtopic_id: Option<DbId>,
    pub marks: i32,
    pub question_type: String,
    pub details: serde_json::Value,
}

/// A validated question eligible for selection. This is what gets cached
/// and what a created session hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCandidate {
    pub question_id: DbId,
    pub topic_id: DbId,
    pub subtopic_id: Option<DbId>,
    pub marks: i32,
    pub details: QuestionDetails,
}

impl TryFrom<QuestionRow> for QuestionCandidate {
    type Error = QuestionPayloadError;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let details = QuestionDetails::from_parts(&row.question_type, &row.details)?;
        Ok(Self {
            question_id: row.question_id,
            topic_id: row.topic_id,
            subtopic_id: row.subtopic_id,
            marks: row.marks,
            details,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_multiple_choice() {
        let details = QuestionDetails::from_parts(
            "multiple_choice",
            &json!({"prompt": "2 + 2?", "options": ["3", "4"], "correct_option": 1}),
        )
        .unwrap();
        assert_matches!(details, QuestionDetails::MultipleChoice { correct_option: 1, .. });
        assert_eq!(details.prompt(), "2 + 2?");
    }

    #[test]
    fn numeric_tolerance_defaults_to_zero() {
        let details =
            QuestionDetails::from_parts("numeric", &json!({"prompt": "pi?", "answer": 3.14}))
                .unwrap();
        assert_matches!(details, QuestionDetails::Numeric { tolerance, .. } if tolerance == 0.0);
    }

    #[test]
    fn rejects_out_of_range_correct_option() {
        let err = QuestionDetails::from_parts(
            "multiple_choice",
            &json!({"prompt": "?", "options": ["a", "b"], "correct_option": 2}),
        )
        .unwrap_err();
        assert_matches!(err, QuestionPayloadError::Invalid(_));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = QuestionDetails::from_parts("essay", &json!({"prompt": "Discuss."})).unwrap_err();
        assert_matches!(err, QuestionPayloadError::Malformed { .. });
    }

    #[test]
    fn rejects_non_object_details() {
        let err = QuestionDetails::from_parts("true_false", &json!([true])).unwrap_err();
        assert_matches!(err, QuestionPayloadError::NotAnObject { .. });
    }

    #[test]
    fn stored_type_overrides_payload_tag() {
        let details = QuestionDetails::from_parts(
            "true_false",
            &json!({"type": "numeric", "prompt": "Sky is blue", "answer": true}),
        )
        .unwrap();
        assert_matches!(details, QuestionDetails::TrueFalse { answer: true, .. });
    }

    #[test]
    fn row_converts_into_candidate() {
        let row = QuestionRow {
            question_id: 11,
            topic_id: 2,
            subtopic_id: Some(5),
            marks: 2,
            question_type: "short_answer".into(),
            details: json!({"prompt": "Capital of France?", "accepted_answers": ["Paris"]}),
        };
        let candidate = QuestionCandidate::try_from(row).unwrap();
        assert_eq!(candidate.question_id, 11);
        assert_eq!(candidate.subtopic_id, Some(5));
    }

    #[test]
    fn filter_display_lists_present_parts() {
        let filter = QuestionFilter {
            subject_id: 1,
            topic_id: Some(2),
            subtopic_id: None,
        };
        assert_eq!(filter.to_string(), "subject 1, topic 2");
    }
}
