use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised while building a `Question`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,

    #[error("{kind} question needs at least one option")]
    NoOptions { kind: QuestionKind },

    #[error("free-text question cannot carry options")]
    UnexpectedOptions,

    #[error("{kind} question needs exactly one answer key of the matching shape")]
    KeyMismatch { kind: QuestionKind },

    #[error("option index {index} out of range for {len} options")]
    OptionOutOfRange { index: usize, len: usize },

    #[error("correct sequence cannot be empty")]
    EmptySequence,

    #[error("expected answer cannot be blank")]
    BlankExpectedAnswer,
}

//
// ─── KIND ─────────────────────────────────────────────────────────────────────
//

/// The closed set of question variants a lesson can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    /// Pick one text option.
    SingleChoiceText,
    /// Pick one option rendered as an image.
    SingleChoiceImage,
    /// Build the answer by picking words in the correct sequence.
    MultiSelectOrdered,
    /// Fill a blank by picking options.
    MultiSelectUnordered,
    /// Type the answer.
    FreeText,
}

impl QuestionKind {
    #[must_use]
    pub fn is_single_choice(self) -> bool {
        matches!(self, Self::SingleChoiceText | Self::SingleChoiceImage)
    }

    #[must_use]
    pub fn is_multi_select(self) -> bool {
        matches!(self, Self::MultiSelectOrdered | Self::MultiSelectUnordered)
    }

    /// Stable wire name, shared by JSON and `SQLite` storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleChoiceText => "single-choice-text",
            Self::SingleChoiceImage => "single-choice-image",
            Self::MultiSelectOrdered => "multi-select-ordered",
            Self::MultiSelectUnordered => "multi-select-unordered",
            Self::FreeText => "free-text",
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── OPTIONS & KEYS ───────────────────────────────────────────────────────────
//

/// One selectable answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

impl AnswerOption {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image: None,
            is_correct: None,
        }
    }

    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

/// What counts as the correct answer. Exactly one shape per question kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    /// Index of the correct option (single-choice kinds).
    Option(usize),
    /// Option indices in the required order (multi-select kinds).
    Sequence(Vec<usize>),
    /// Expected typed answer (free-text).
    Text(String),
}

//
// ─── QUESTION ─────────────────────────────────────────────────────────────────
//

/// A validated quiz item.
///
/// The answer key always matches `kind`, and every option index it references
/// is in range. Deserialization goes through [`QuestionRecord`] and applies the
/// same checks as [`Question::new`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord", into = "QuestionRecord")]
pub struct Question {
    id: QuestionId,
    kind: QuestionKind,
    prompt: String,
    options: Vec<AnswerOption>,
    key: AnswerKey,
    explanation: Option<String>,
    avatar: Option<String>,
}

impl Question {
    /// Build a question, checking that the answer key fits the kind.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when the id is blank, the options do not suit the
    /// kind, or the key has the wrong shape or references a missing option.
    pub fn new(
        id: QuestionId,
        kind: QuestionKind,
        prompt: impl Into<String>,
        options: Vec<AnswerOption>,
        key: AnswerKey,
    ) -> Result<Self, QuestionError> {
        if id.as_str().trim().is_empty() {
            return Err(QuestionError::EmptyId);
        }

        let len = options.len();
        let in_range = |index: usize| {
            if index < len {
                Ok(())
            } else {
                Err(QuestionError::OptionOutOfRange { index, len })
            }
        };

        match (&key, kind) {
            (AnswerKey::Option(index), k) if k.is_single_choice() => {
                if options.is_empty() {
                    return Err(QuestionError::NoOptions { kind });
                }
                in_range(*index)?;
            }
            (AnswerKey::Sequence(sequence), k) if k.is_multi_select() => {
                if options.is_empty() {
                    return Err(QuestionError::NoOptions { kind });
                }
                if sequence.is_empty() {
                    return Err(QuestionError::EmptySequence);
                }
                sequence.iter().copied().try_for_each(in_range)?;
            }
            (AnswerKey::Text(expected), QuestionKind::FreeText) => {
                if !options.is_empty() {
                    return Err(QuestionError::UnexpectedOptions);
                }
                if expected.trim().is_empty() {
                    return Err(QuestionError::BlankExpectedAnswer);
                }
            }
            _ => return Err(QuestionError::KeyMismatch { kind }),
        }

        Ok(Self {
            id,
            kind,
            prompt: prompt.into(),
            options,
            key,
            explanation: None,
            avatar: None,
        })
    }

    /// Attach the text shown when the learner answers incorrectly.
    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Attach an avatar/illustration reference.
    #[must_use]
    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    #[must_use]
    pub fn key(&self) -> &AnswerKey {
        &self.key
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }
}

//
// ─── WIRE RECORD ──────────────────────────────────────────────────────────────
//

/// Flat serialized shape of a question, as delivered by the question bank.
///
/// Exactly one of `correct_option_index`, `correct_sequence` and
/// `expected_answer` must be set, matching `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRecord {
    pub id: QuestionId,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_sequence: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = QuestionError;

    fn try_from(record: QuestionRecord) -> Result<Self, Self::Error> {
        let kind = record.kind;
        let key = match (
            record.correct_option_index,
            record.correct_sequence,
            record.expected_answer,
        ) {
            (Some(index), None, None) => AnswerKey::Option(index),
            (None, Some(sequence), None) => AnswerKey::Sequence(sequence),
            (None, None, Some(expected)) => AnswerKey::Text(expected),
            _ => return Err(QuestionError::KeyMismatch { kind }),
        };

        let mut question = Question::new(record.id, kind, record.prompt, record.options, key)?;
        question.explanation = record.explanation;
        question.avatar = record.avatar;
        Ok(question)
    }
}

impl From<Question> for QuestionRecord {
    fn from(question: Question) -> Self {
        let (correct_option_index, correct_sequence, expected_answer) = match question.key {
            AnswerKey::Option(index) => (Some(index), None, None),
            AnswerKey::Sequence(sequence) => (None, Some(sequence), None),
            AnswerKey::Text(expected) => (None, None, Some(expected)),
        };
        Self {
            id: question.id,
            kind: question.kind,
            prompt: question.prompt,
            options: question.options,
            correct_option_index,
            correct_sequence,
            expected_answer,
            explanation: question.explanation,
            avatar: question.avatar,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn options(texts: &[&str]) -> Vec<AnswerOption> {
        texts.iter().map(|t| AnswerOption::text(*t)).collect()
    }

    #[test]
    fn single_choice_requires_in_range_index() {
        let err = Question::new(
            QuestionId::new("q1"),
            QuestionKind::SingleChoiceText,
            "Pick",
            options(&["a", "b"]),
            AnswerKey::Option(2),
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::OptionOutOfRange { index: 2, len: 2 });
    }

    #[test]
    fn key_shape_must_match_kind() {
        let err = Question::new(
            QuestionId::new("q1"),
            QuestionKind::MultiSelectOrdered,
            "Order",
            options(&["a", "b"]),
            AnswerKey::Option(0),
        )
        .unwrap_err();
        assert!(matches!(err, QuestionError::KeyMismatch { .. }));
    }

    #[test]
    fn free_text_rejects_options_and_blank_answer() {
        let err = Question::new(
            QuestionId::new("q1"),
            QuestionKind::FreeText,
            "Type",
            options(&["a"]),
            AnswerKey::Text("hello".into()),
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::UnexpectedOptions);

        let err = Question::new(
            QuestionId::new("q1"),
            QuestionKind::FreeText,
            "Type",
            Vec::new(),
            AnswerKey::Text("   ".into()),
        )
        .unwrap_err();
        assert_eq!(err, QuestionError::BlankExpectedAnswer);
    }

    #[test]
    fn record_with_two_keys_is_rejected() {
        let json = r#"{
            "id": "q1",
            "type": "single-choice-text",
            "prompt": "Pick",
            "options": [{"text": "a"}, {"text": "b"}],
            "correctOptionIndex": 0,
            "expectedAnswer": "a"
        }"#;
        let err = serde_json::from_str::<Question>(json).unwrap_err();
        assert!(err.to_string().contains("answer key"));
    }

    #[test]
    fn deserializes_ordered_question_with_explanation() {
        let json = r#"{
            "id": "q7",
            "type": "multi-select-ordered",
            "prompt": "I am a student",
            "options": [{"text": "student"}, {"text": "I"}, {"text": "am"}, {"text": "a"}],
            "correctSequence": [1, 2, 3, 0],
            "explanation": "Subject comes first."
        }"#;
        let question: Question = serde_json::from_str(json).unwrap();
        assert_eq!(question.kind(), QuestionKind::MultiSelectOrdered);
        assert_eq!(question.key(), &AnswerKey::Sequence(vec![1, 2, 3, 0]));
        assert_eq!(question.explanation(), Some("Subject comes first."));

        let back = serde_json::to_value(&question).unwrap();
        assert_eq!(back["type"], "multi-select-ordered");
        assert!(back.get("correctOptionIndex").is_none());
    }
}
