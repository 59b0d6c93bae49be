use std::sync::Arc;

use lesson_core::model::{LearnerId, LearnerProgress, LessonCatalog, LessonId};
use storage::repository::ProgressRepository;

use crate::Clock;
use crate::error::ProgressServiceError;

/// Lock state of one catalog lesson, for a lesson map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LessonStatus {
    pub lesson: LessonId,
    pub unlocked: bool,
}

/// Read side of learner progress: XP, lesson map and streak.
#[derive(Clone)]
pub struct LearnerProgressService {
    clock: Clock,
    catalog: LessonCatalog,
    progress: Arc<dyn ProgressRepository>,
}

impl LearnerProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: LessonCatalog,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            progress,
        }
    }

    /// Stored progress, or the initial state for a new learner.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on repository failures.
    pub async fn progress(
        &self,
        learner: LearnerId,
    ) -> Result<LearnerProgress, ProgressServiceError> {
        Ok(self
            .progress
            .get_progress(learner)
            .await?
            .unwrap_or_default())
    }

    /// Every catalog lesson in order with its lock state.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on repository failures.
    pub async fn lesson_map(
        &self,
        learner: LearnerId,
    ) -> Result<Vec<LessonStatus>, ProgressServiceError> {
        let progress = self.progress(learner).await?;
        Ok(self
            .catalog
            .lessons()
            .map(|lesson| LessonStatus {
                lesson,
                unlocked: progress.is_unlocked(lesson),
            })
            .collect())
    }

    /// The furthest unlocked lesson, where a learner would continue.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on repository failures.
    pub async fn next_lesson(&self, learner: LearnerId) -> Result<LessonId, ProgressServiceError> {
        let progress = self.progress(learner).await?;
        Ok(self
            .catalog
            .lessons()
            .filter(|l| progress.is_unlocked(*l))
            .last()
            .unwrap_or_else(LessonId::first))
    }

    /// Streak as of today; zero once a day was skipped.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` on repository failures.
    pub async fn current_streak(&self, learner: LearnerId) -> Result<u32, ProgressServiceError> {
        let progress = self.progress(learner).await?;
        Ok(progress.streak().current(self.clock.today()))
    }
}
