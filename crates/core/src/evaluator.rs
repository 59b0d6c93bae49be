//! Answer evaluation: a pure mapping from `(Question, Selection)` to correctness.

use crate::model::{AnswerKey, Question, QuestionKind, Selection, SelectionError};

/// Decide whether `selection` answers `question` correctly.
///
/// - single-choice: the picked index equals the correct option.
/// - multi-select (ordered and unordered): the picked indices equal the
///   canonical sequence, same length and same order.
/// - free-text: trimmed, case-folded text equals the expected answer.
///
/// An empty selection is a valid "nothing chosen" answer and is incorrect.
///
/// # Errors
///
/// Returns `SelectionError::ShapeMismatch` when the selection shape does not
/// fit the question kind, e.g. text submitted for a single-choice question.
///
/// # Examples
///
/// ```
/// # use lesson_core::evaluator::evaluate;
/// # use lesson_core::model::{AnswerKey, AnswerOption, Question, QuestionId, QuestionKind, Selection};
/// let question = Question::new(
///     QuestionId::new("q1"),
///     QuestionKind::FreeText,
///     "Translate: مرحبا",
///     Vec::new(),
///     AnswerKey::Text("Hello".into()),
/// )
/// .unwrap();
/// assert!(evaluate(&question, &Selection::Text("  hello ".into())).unwrap());
/// ```
pub fn evaluate(question: &Question, selection: &Selection) -> Result<bool, SelectionError> {
    let kind = question.kind();
    let mismatch = || SelectionError::ShapeMismatch {
        kind,
        selection: selection.shape_name(),
    };

    match (question.key(), selection) {
        (_, Selection::Empty) => Ok(false),
        (AnswerKey::Option(correct), Selection::Single(picked)) if kind.is_single_choice() => {
            Ok(picked == correct)
        }
        (AnswerKey::Sequence(correct), Selection::Sequence(picked)) if kind.is_multi_select() => {
            Ok(picked == correct)
        }
        (AnswerKey::Text(expected), Selection::Text(typed)) if kind == QuestionKind::FreeText => {
            Ok(normalize(typed) == normalize(expected))
        }
        _ => Err(mismatch()),
    }
}

/// Trim and case-fold free text for comparison.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerOption, QuestionId};

    fn choice(kind: QuestionKind, key: AnswerKey) -> Question {
        let options = ["I", "am", "here"]
            .into_iter()
            .map(AnswerOption::text)
            .collect();
        Question::new(QuestionId::new("q"), kind, "prompt", options, key).unwrap()
    }

    fn free_text(expected: &str) -> Question {
        Question::new(
            QuestionId::new("q"),
            QuestionKind::FreeText,
            "prompt",
            Vec::new(),
            AnswerKey::Text(expected.into()),
        )
        .unwrap()
    }

    #[test]
    fn single_choice_compares_index() {
        for kind in [QuestionKind::SingleChoiceText, QuestionKind::SingleChoiceImage] {
            let q = choice(kind, AnswerKey::Option(1));
            assert!(evaluate(&q, &Selection::Single(1)).unwrap());
            assert!(!evaluate(&q, &Selection::Single(0)).unwrap());
        }
    }

    #[test]
    fn ordered_sequence_requires_exact_order() {
        let q = choice(
            QuestionKind::MultiSelectOrdered,
            AnswerKey::Sequence(vec![2, 0, 1]),
        );
        assert!(evaluate(&q, &Selection::Sequence(vec![2, 0, 1])).unwrap());
        assert!(!evaluate(&q, &Selection::Sequence(vec![0, 2, 1])).unwrap());
        assert!(!evaluate(&q, &Selection::Sequence(vec![2, 0])).unwrap());
        assert!(!evaluate(&q, &Selection::Sequence(vec![2, 0, 1, 1])).unwrap());
    }

    #[test]
    fn unordered_blank_uses_canonical_sequence() {
        let q = choice(
            QuestionKind::MultiSelectUnordered,
            AnswerKey::Sequence(vec![1, 2]),
        );
        assert!(evaluate(&q, &Selection::Sequence(vec![1, 2])).unwrap());
        assert!(!evaluate(&q, &Selection::Sequence(vec![2, 1])).unwrap());
    }

    #[test]
    fn free_text_ignores_case_and_surrounding_space() {
        let q = free_text("Good Morning");
        assert!(evaluate(&q, &Selection::Text(" good morning\n".into())).unwrap());
        assert!(!evaluate(&q, &Selection::Text("good evening".into())).unwrap());
        assert!(!evaluate(&q, &Selection::Text(String::new())).unwrap());
    }

    #[test]
    fn empty_selection_is_incorrect_for_every_kind() {
        let q = choice(QuestionKind::SingleChoiceText, AnswerKey::Option(0));
        assert!(!evaluate(&q, &Selection::Empty).unwrap());
        assert!(!evaluate(&free_text("x"), &Selection::Empty).unwrap());
    }

    #[test]
    fn mismatched_shape_is_an_error() {
        let q = choice(QuestionKind::SingleChoiceText, AnswerKey::Option(0));
        let err = evaluate(&q, &Selection::Text("I".into())).unwrap_err();
        assert_eq!(
            err,
            SelectionError::ShapeMismatch {
                kind: QuestionKind::SingleChoiceText,
                selection: "text",
            }
        );

        let err = evaluate(&free_text("x"), &Selection::Single(0)).unwrap_err();
        assert!(matches!(err, SelectionError::ShapeMismatch { .. }));
    }
}
