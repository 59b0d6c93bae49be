use thiserror::Error;

use crate::model::question::{Question, QuestionKind};

/// Errors raised when a selection does not fit the question it targets.
///
/// These indicate a host bug (the UI offered an input the question does not
/// accept), never a wrong answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SelectionError {
    #[error("{selection} selection does not fit a {kind} question")]
    ShapeMismatch {
        kind: QuestionKind,
        selection: &'static str,
    },

    #[error("option index {index} out of range for {len} options")]
    OptionOutOfRange { index: usize, len: usize },

    #[error("no selected option at position {position} ({len} selected)")]
    PositionOutOfRange { position: usize, len: usize },
}

/// The learner's in-progress answer for the current question.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Nothing chosen yet.
    #[default]
    Empty,
    /// One chosen option (single-choice kinds).
    Single(usize),
    /// Chosen options in tap order (multi-select kinds).
    Sequence(Vec<usize>),
    /// Typed answer (free-text).
    Text(String),
}

impl Selection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Single(_) => false,
            Self::Sequence(seq) => seq.is_empty(),
            Self::Text(text) => text.is_empty(),
        }
    }

    pub(crate) fn shape_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Single(_) => "single",
            Self::Sequence(_) => "sequence",
            Self::Text(_) => "text",
        }
    }

    /// Pick an option: replaces the choice on single-choice questions,
    /// appends on multi-select ones.
    pub(crate) fn select(&mut self, question: &Question, index: usize) -> Result<(), SelectionError> {
        let len = question.options().len();
        let kind = question.kind();
        if kind == QuestionKind::FreeText {
            return Err(SelectionError::ShapeMismatch {
                kind,
                selection: "option",
            });
        }
        if index >= len {
            return Err(SelectionError::OptionOutOfRange { index, len });
        }

        if kind.is_single_choice() {
            *self = Self::Single(index);
            return Ok(());
        }

        match self {
            Self::Sequence(seq) => seq.push(index),
            _ => *self = Self::Sequence(vec![index]),
        }
        Ok(())
    }

    /// Remove the option at `position` of the picked sequence.
    pub(crate) fn deselect(
        &mut self,
        question: &Question,
        position: usize,
    ) -> Result<(), SelectionError> {
        let kind = question.kind();
        if !kind.is_multi_select() {
            return Err(SelectionError::ShapeMismatch {
                kind,
                selection: "sequence",
            });
        }

        let len = match self {
            Self::Sequence(seq) => seq.len(),
            _ => 0,
        };
        if position >= len {
            return Err(SelectionError::PositionOutOfRange { position, len });
        }
        if let Self::Sequence(seq) = self {
            seq.remove(position);
        }
        Ok(())
    }

    pub(crate) fn set_text(
        &mut self,
        question: &Question,
        text: impl Into<String>,
    ) -> Result<(), SelectionError> {
        let kind = question.kind();
        if kind != QuestionKind::FreeText {
            return Err(SelectionError::ShapeMismatch {
                kind,
                selection: "text",
            });
        }
        *self = Self::Text(text.into());
        Ok(())
    }
}
