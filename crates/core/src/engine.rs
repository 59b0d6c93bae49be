//! Lesson progression state machine.
//!
//! A [`LessonEngine`] owns one run through a lesson: the question list, the
//! current index, remaining lives, the learner's in-progress selection and the
//! correct-answer count. It performs no I/O; terminal outcomes are handed back
//! to the caller as [`LessonReport`] values.
//!
//! Every operation invoked in a state that forbids it returns
//! [`EngineError::InvalidStateTransition`] and leaves the engine untouched.
//! Selection-shape violations return [`EngineError::InvalidSelection`], also
//! without mutation.

use std::collections::HashSet;
use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::evaluator::evaluate;
use crate::model::{
    LessonReport, LessonSettings, Question, QuestionId, Selection, SelectionError,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("lesson has no questions")]
    EmptyLesson,

    #[error("too many questions for a single lesson: {len}")]
    TooManyQuestions { len: usize },

    #[error("question id {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("cannot {operation} while {state}")]
    InvalidStateTransition {
        operation: Operation,
        state: LessonState,
    },

    #[error(transparent)]
    InvalidSelection(#[from] SelectionError),
}

//
// ─── STATES & OPERATIONS ───────────────────────────────────────────────────────
//

/// Where the session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LessonState {
    /// The learner is building an answer for the current question.
    AwaitingSelection,
    /// The answer was checked; waiting for `advance()`.
    ShowingResult { is_correct: bool },
    Completed,
    /// Lives ran out.
    Failed,
    /// The host ended the session early.
    Aborted,
}

impl LessonState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingSelection => "awaiting selection",
            Self::ShowingResult { .. } => "showing result",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for LessonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine operations, named in `InvalidStateTransition` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SelectOption,
    DeselectOption,
    SetFreeText,
    SubmitAnswer,
    Advance,
    Abort,
    Reset,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SelectOption => "select an option",
            Self::DeselectOption => "deselect an option",
            Self::SetFreeText => "set free text",
            Self::SubmitAnswer => "submit an answer",
            Self::Advance => "advance",
            Self::Abort => "abort",
            Self::Reset => "reset",
        })
    }
}

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

/// Result of checking the current answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub lives_remaining: u32,
    /// The question's explanation, only set for incorrect answers.
    pub explanation: Option<String>,
}

/// Snapshot of session progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonProgress {
    pub current_index: usize,
    pub total: usize,
    pub lives: u32,
    pub max_lives: u32,
    pub correct_count: u32,
    pub state: LessonState,
}

impl LessonProgress {
    /// `current_index / total * 100`, rounded down.
    #[must_use]
    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let pct = self.current_index.min(self.total) * 100 / self.total;
        u8::try_from(pct).unwrap_or(100)
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// One learner's run through a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonEngine {
    questions: Vec<Question>,
    settings: LessonSettings,
    current: usize,
    lives: u32,
    correct_count: u32,
    selection: Selection,
    state: LessonState,
    report: Option<LessonReport>,
}

impl LessonEngine {
    /// Start a session over `questions`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::EmptyLesson` if no questions are provided,
    /// `EngineError::DuplicateQuestion` if two questions share an id, and
    /// `EngineError::TooManyQuestions` if the count does not fit in `u32`.
    pub fn new(questions: Vec<Question>, settings: LessonSettings) -> Result<Self, EngineError> {
        if questions.is_empty() {
            return Err(EngineError::EmptyLesson);
        }
        if u32::try_from(questions.len()).is_err() {
            return Err(EngineError::TooManyQuestions {
                len: questions.len(),
            });
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(EngineError::DuplicateQuestion(question.id().clone()));
            }
        }

        Ok(Self {
            lives: settings.max_lives(),
            questions,
            settings,
            current: 0,
            correct_count: 0,
            selection: Selection::Empty,
            state: LessonState::AwaitingSelection,
            report: None,
        })
    }

    #[must_use]
    pub fn state(&self) -> LessonState {
        self.state
    }

    #[must_use]
    pub fn settings(&self) -> LessonSettings {
        self.settings
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn lives(&self) -> u32 {
        self.lives
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        count_u32(self.questions.len())
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The question on screen, or `None` once the session has ended.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        if self.state.is_terminal() {
            None
        } else {
            self.questions.get(self.current)
        }
    }

    /// The terminal report, once the session has ended.
    #[must_use]
    pub fn report(&self) -> Option<LessonReport> {
        self.report
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> LessonProgress {
        LessonProgress {
            current_index: self.current,
            total: self.questions.len(),
            lives: self.lives,
            max_lives: self.settings.max_lives(),
            correct_count: self.correct_count,
            state: self.state,
        }
    }

    /// Pick option `index` of the current question.
    ///
    /// Single-choice questions replace the previous pick; multi-select
    /// questions append to the picked sequence.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidStateTransition` outside `AwaitingSelection`,
    /// `EngineError::InvalidSelection` for free-text questions or an unknown option.
    pub fn select_option(&mut self, index: usize) -> Result<(), EngineError> {
        self.require_awaiting(Operation::SelectOption)?;
        let question = &self.questions[self.current];
        self.selection.select(question, index)?;
        Ok(())
    }

    /// Remove the entry at `position` of the picked sequence.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidStateTransition` outside `AwaitingSelection`,
    /// `EngineError::InvalidSelection` for non multi-select questions or a
    /// position past the end of the sequence.
    pub fn deselect_option(&mut self, position: usize) -> Result<(), EngineError> {
        self.require_awaiting(Operation::DeselectOption)?;
        let question = &self.questions[self.current];
        self.selection.deselect(question, position)?;
        Ok(())
    }

    /// Replace the typed answer of a free-text question.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidStateTransition` outside `AwaitingSelection`,
    /// `EngineError::InvalidSelection` for any other question kind.
    pub fn set_free_text(&mut self, text: impl Into<String>) -> Result<(), EngineError> {
        self.require_awaiting(Operation::SetFreeText)?;
        let question = &self.questions[self.current];
        self.selection.set_text(question, text)?;
        Ok(())
    }

    /// Check the current selection.
    ///
    /// A correct answer bumps the correct count; an incorrect one costs a life.
    /// Either way the session moves to `ShowingResult`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidStateTransition` outside `AwaitingSelection`
    /// and `EngineError::InvalidSelection` if the selection shape does not fit
    /// the question.
    pub fn submit_answer(&mut self) -> Result<AnswerFeedback, EngineError> {
        self.require_awaiting(Operation::SubmitAnswer)?;
        let question = &self.questions[self.current];
        let is_correct = evaluate(question, &self.selection)?;

        let explanation = if is_correct {
            self.correct_count = self.correct_count.saturating_add(1);
            None
        } else {
            self.lives = self.lives.saturating_sub(1);
            question.explanation().map(str::to_owned)
        };
        self.state = LessonState::ShowingResult { is_correct };

        debug!(
            question = %question.id(),
            index = self.current,
            is_correct,
            lives = self.lives,
            "answer checked"
        );

        Ok(AnswerFeedback {
            is_correct,
            lives_remaining: self.lives,
            explanation,
        })
    }

    /// Leave the result screen.
    ///
    /// With no lives left the session fails; otherwise it moves to the next
    /// question, or completes after the last one. Returns the terminal report
    /// when the session ends here.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidStateTransition` outside `ShowingResult`.
    pub fn advance(&mut self) -> Result<Option<LessonReport>, EngineError> {
        if !matches!(self.state, LessonState::ShowingResult { .. }) {
            return Err(self.invalid(Operation::Advance));
        }

        if self.lives == 0 {
            let report = LessonReport::Failed {
                correct_count: self.correct_count,
                total_questions: self.total_questions(),
            };
            return Ok(Some(self.finish(LessonState::Failed, report)));
        }

        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.selection = Selection::Empty;
            self.state = LessonState::AwaitingSelection;
            debug!(index = self.current, "next question");
            return Ok(None);
        }

        let report = LessonReport::completed(self.correct_count, self.total_questions());
        Ok(Some(self.finish(LessonState::Completed, report)))
    }

    /// End the session early.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidStateTransition` if the session already ended.
    pub fn abort(&mut self) -> Result<LessonReport, EngineError> {
        if self.state.is_terminal() {
            return Err(self.invalid(Operation::Abort));
        }
        let report = LessonReport::Aborted {
            correct_count: self.correct_count,
            questions_answered: count_u32(self.current),
        };
        Ok(self.finish(LessonState::Aborted, report))
    }

    /// Start the same lesson over ("try again").
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidStateTransition` unless the session has ended.
    pub fn reset(&mut self) -> Result<(), EngineError> {
        if !self.state.is_terminal() {
            return Err(self.invalid(Operation::Reset));
        }
        self.current = 0;
        self.lives = self.settings.max_lives();
        self.correct_count = 0;
        self.selection = Selection::Empty;
        self.state = LessonState::AwaitingSelection;
        self.report = None;
        debug!("lesson reset");
        Ok(())
    }

    fn require_awaiting(&self, operation: Operation) -> Result<(), EngineError> {
        if self.state == LessonState::AwaitingSelection {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: Operation) -> EngineError {
        EngineError::InvalidStateTransition {
            operation,
            state: self.state,
        }
    }

    fn finish(&mut self, state: LessonState, report: LessonReport) -> LessonReport {
        self.state = state;
        self.report = Some(report);
        debug!(outcome = report.outcome().as_str(), correct = self.correct_count, "lesson ended");
        report
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
