use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use lesson_core::{AnswerFeedback, EngineError, LessonEngine};
use lesson_core::model::{
    CompletionEffect, LearnerId, LessonCatalog, LessonId, LessonReport, LessonSettings,
    ProgressError,
};
use storage::repository::{
    LessonReportRecord, LessonReportSink, ProgressRepository, QuestionBank,
};

use crate::Clock;
use crate::error::LessonError;

/// One learner's lesson in flight: the engine plus what the host needs to
/// persist its outcome.
///
/// Answering goes through the run itself; the steps that end or restart the
/// lesson go through [`LessonLoopService`] so the stored report always
/// matches the engine's.
#[derive(Debug, Clone)]
pub struct LessonRun {
    engine: LessonEngine,
    learner_id: LearnerId,
    lesson_id: LessonId,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    report_id: Option<i64>,
    completion: Option<CompletionEffect>,
}

impl LessonRun {
    #[must_use]
    pub fn engine(&self) -> &LessonEngine {
        &self.engine
    }

    /// # Errors
    ///
    /// Returns the engine's rejection; see [`LessonEngine::select_option`].
    pub fn select_option(&mut self, index: usize) -> Result<(), EngineError> {
        self.engine.select_option(index)
    }

    /// # Errors
    ///
    /// Returns the engine's rejection; see [`LessonEngine::deselect_option`].
    pub fn deselect_option(&mut self, position: usize) -> Result<(), EngineError> {
        self.engine.deselect_option(position)
    }

    /// # Errors
    ///
    /// Returns the engine's rejection; see [`LessonEngine::set_free_text`].
    pub fn set_free_text(&mut self, text: impl Into<String>) -> Result<(), EngineError> {
        self.engine.set_free_text(text)
    }

    /// # Errors
    ///
    /// Returns the engine's rejection; see [`LessonEngine::submit_answer`].
    pub fn submit_answer(&mut self) -> Result<AnswerFeedback, EngineError> {
        self.engine.submit_answer()
    }

    #[must_use]
    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Storage id of the persisted report, once it was written.
    #[must_use]
    pub fn report_id(&self) -> Option<i64> {
        self.report_id
    }

    /// Progress changes applied for a completed lesson.
    #[must_use]
    pub fn completion(&self) -> Option<CompletionEffect> {
        self.completion
    }
}

/// Terminal outcome of a run after persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonFinish {
    pub report: LessonReport,
    pub report_id: i64,
    /// Set only for completed lessons.
    pub completion: Option<CompletionEffect>,
}

/// Orchestrates lesson start, terminal persistence and progress updates.
#[derive(Clone)]
pub struct LessonLoopService {
    clock: Clock,
    catalog: LessonCatalog,
    settings: LessonSettings,
    questions: Arc<dyn QuestionBank>,
    reports: Arc<dyn LessonReportSink>,
    progress: Arc<dyn ProgressRepository>,
    shuffle: bool,
}

impl LessonLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: LessonCatalog,
        questions: Arc<dyn QuestionBank>,
        reports: Arc<dyn LessonReportSink>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            settings: LessonSettings::default(),
            questions,
            reports,
            progress,
            shuffle: false,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: LessonSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Present questions in random order instead of the bank's order.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &LessonCatalog {
        &self.catalog
    }

    /// Start a lesson for a learner.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Progress` if the lesson is not in the catalog,
    /// `LessonError::Locked` if the learner has not unlocked it,
    /// `LessonError::Storage` if loading fails and `LessonError::Engine` if
    /// the loaded questions cannot form a lesson.
    pub async fn start_lesson(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
    ) -> Result<LessonRun, LessonError> {
        if !self.catalog.contains(lesson_id) {
            return Err(ProgressError::UnknownLesson(lesson_id).into());
        }

        let progress = self
            .progress
            .get_progress(learner_id)
            .await?
            .unwrap_or_default();
        if !progress.is_unlocked(lesson_id) {
            return Err(LessonError::Locked(lesson_id));
        }

        let mut questions = self.questions.load_questions(lesson_id).await.map_err(|e| {
            warn!(lesson = %lesson_id, error = %e, "failed to load lesson");
            e
        })?;
        if self.shuffle {
            questions.as_mut_slice().shuffle(&mut rng());
        }

        let engine = LessonEngine::new(questions, self.settings)?;
        info!(
            learner = %learner_id,
            lesson = %lesson_id,
            questions = engine.total_questions(),
            "lesson started"
        );

        Ok(LessonRun {
            engine,
            learner_id,
            lesson_id,
            started_at: self.clock.now(),
            finished_at: None,
            report_id: None,
            completion: None,
        })
    }

    /// Leave the result screen, persisting the outcome if the lesson ends.
    ///
    /// Returns `None` while the lesson continues.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Engine` if the engine refuses to advance, or
    /// persistence errors once the lesson ended. In the latter case the run
    /// stays terminal and [`Self::finalize_report`] can retry.
    pub async fn advance(&self, run: &mut LessonRun) -> Result<Option<LessonFinish>, LessonError> {
        if run.engine.advance()?.is_none() {
            return Ok(None);
        }
        run.finished_at = Some(self.clock.now());
        self.finalize_report(run).await.map(Some)
    }

    /// End the lesson early and persist the aborted report.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Engine` if the lesson already ended, or
    /// persistence errors.
    pub async fn abort(&self, run: &mut LessonRun) -> Result<LessonFinish, LessonError> {
        run.engine.abort()?;
        run.finished_at = Some(self.clock.now());
        self.finalize_report(run).await
    }

    /// Persist the terminal report and, for a completed lesson, apply progress.
    ///
    /// Safe to call repeatedly: steps that already succeeded are skipped.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::NotTerminal` if the lesson is still running, or
    /// storage and progress errors.
    pub async fn finalize_report(&self, run: &mut LessonRun) -> Result<LessonFinish, LessonError> {
        let report = run.engine.report().ok_or(LessonError::NotTerminal)?;
        let finished_at = *run.finished_at.get_or_insert_with(|| self.clock.now());

        let report_id = match run.report_id {
            Some(id) => id,
            None => {
                let record = LessonReportRecord {
                    learner_id: run.learner_id,
                    lesson_id: run.lesson_id,
                    report,
                    started_at: run.started_at,
                    finished_at,
                };
                let id = self.reports.append_report(&record).await?;
                info!(
                    learner = %run.learner_id,
                    lesson = %run.lesson_id,
                    outcome = report.outcome().as_str(),
                    report_id = id,
                    "lesson report stored"
                );
                run.report_id = Some(id);
                id
            }
        };

        if report.is_completed() && run.completion.is_none() {
            let mut progress = self
                .progress
                .get_progress(run.learner_id)
                .await?
                .unwrap_or_default();
            let effect = progress.record_completion(run.lesson_id, &self.catalog, finished_at)?;
            self.progress
                .save_progress(run.learner_id, &progress)
                .await?;
            if let Some(next) = effect.newly_unlocked {
                info!(learner = %run.learner_id, lesson = %next, "lesson unlocked");
            }
            run.completion = Some(effect);
        }

        Ok(LessonFinish {
            report,
            report_id,
            completion: run.completion,
        })
    }

    /// Start the same lesson over after it ended.
    ///
    /// An outcome that was not persisted yet is lost.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Engine` while the lesson is still running.
    pub fn retry(&self, run: &mut LessonRun) -> Result<(), LessonError> {
        if run.engine.is_terminal() && run.report_id.is_none() {
            warn!(lesson = %run.lesson_id, "retrying without a stored report");
        }
        run.engine.reset()?;
        run.started_at = self.clock.now();
        run.finished_at = None;
        run.report_id = None;
        run.completion = None;
        Ok(())
    }
}
