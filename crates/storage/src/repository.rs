use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lesson_core::model::{LearnerId, LearnerProgress, LessonId, LessonReport, Question};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A terminal lesson report together with who produced it and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonReportRecord {
    pub learner_id: LearnerId,
    pub lesson_id: LessonId,
    pub report: LessonReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Persisted report plus its storage identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonReportRow {
    pub id: i64,
    pub record: LessonReportRecord,
}

impl LessonReportRow {
    #[must_use]
    pub fn new(id: i64, record: LessonReportRecord) -> Self {
        Self { id, record }
    }
}

/// Source of the ordered question list for a lesson.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// Load the questions of `lesson` in presentation order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson is unknown, or other storage errors.
    async fn load_questions(&self, lesson: LessonId) -> Result<Vec<Question>, StorageError>;
}

/// Write side of the question bank, used to seed lesson content.
#[async_trait]
pub trait LessonContentRepository: Send + Sync {
    /// Replace the full question list of `lesson`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the questions cannot be stored.
    async fn replace_questions(
        &self,
        lesson: LessonId,
        questions: &[Question],
    ) -> Result<(), StorageError>;

    /// All lessons that currently have content, in course order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_lessons(&self) -> Result<Vec<LessonId>, StorageError>;
}

/// Persistence for terminal lesson reports.
#[async_trait]
pub trait LessonReportSink: Send + Sync {
    /// Append a report and return its identifier.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the report cannot be stored.
    async fn append_report(&self, record: &LessonReportRecord) -> Result<i64, StorageError>;

    /// Fetch a report by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_report(&self, id: i64) -> Result<LessonReportRecord, StorageError>;

    /// Most recent reports of a learner for one lesson, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_reports(
        &self,
        learner: LearnerId,
        lesson: LessonId,
        limit: u32,
    ) -> Result<Vec<LessonReportRow>, StorageError>;
}

/// Persistence for course-level learner progress.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch progress, or `None` for a learner who never finished a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_progress(&self, learner: LearnerId)
    -> Result<Option<LearnerProgress>, StorageError>;

    /// Persist or replace progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the progress cannot be stored.
    async fn save_progress(
        &self,
        learner: LearnerId,
        progress: &LearnerProgress,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    questions: Arc<Mutex<HashMap<LessonId, Vec<Question>>>>,
    reports: Arc<Mutex<Vec<LessonReportRecord>>>,
    progress: Arc<Mutex<HashMap<LearnerId, LearnerProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl QuestionBank for InMemoryRepository {
    async fn load_questions(&self, lesson: LessonId) -> Result<Vec<Question>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        guard.get(&lesson).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl LessonContentRepository for InMemoryRepository {
    async fn replace_questions(
        &self,
        lesson: LessonId,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let mut guard = self.questions.lock().map_err(poisoned)?;
        guard.insert(lesson, questions.to_vec());
        Ok(())
    }

    async fn list_lessons(&self) -> Result<Vec<LessonId>, StorageError> {
        let guard = self.questions.lock().map_err(poisoned)?;
        let mut lessons: Vec<_> = guard.keys().copied().collect();
        lessons.sort();
        Ok(lessons)
    }
}

#[async_trait]
impl LessonReportSink for InMemoryRepository {
    async fn append_report(&self, record: &LessonReportRecord) -> Result<i64, StorageError> {
        let mut guard = self.reports.lock().map_err(poisoned)?;
        guard.push(record.clone());
        i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("report id overflow".into()))
    }

    async fn get_report(&self, id: i64) -> Result<LessonReportRecord, StorageError> {
        let guard = self.reports.lock().map_err(poisoned)?;
        let index = id
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or(StorageError::NotFound)?;
        guard.get(index).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_reports(
        &self,
        learner: LearnerId,
        lesson: LessonId,
        limit: u32,
    ) -> Result<Vec<LessonReportRow>, StorageError> {
        let guard = self.reports.lock().map_err(poisoned)?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let mut rows: Vec<_> = guard
            .iter()
            .enumerate()
            .filter(|(_, r)| r.learner_id == learner && r.lesson_id == lesson)
            .map(|(i, r)| {
                let id = i64::try_from(i + 1).unwrap_or(i64::MAX);
                LessonReportRow::new(id, r.clone())
            })
            .collect();
        rows.sort_by(|a, b| {
            b.record
                .finished_at
                .cmp(&a.record.finished_at)
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        learner: LearnerId,
    ) -> Result<Option<LearnerProgress>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        Ok(guard.get(&learner).cloned())
    }

    async fn save_progress(
        &self,
        learner: LearnerId,
        progress: &LearnerProgress,
    ) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert(learner, progress.clone());
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub questions: Arc<dyn QuestionBank>,
    pub content: Arc<dyn LessonContentRepository>,
    pub reports: Arc<dyn LessonReportSink>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            questions: Arc::new(repo.clone()),
            content: Arc::new(repo.clone()),
            reports: Arc::new(repo.clone()),
            progress: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lesson_core::model::{AnswerKey, AnswerOption, QuestionId, QuestionKind};
    use lesson_core::time::fixed_now;

    fn question(id: &str) -> Question {
        Question::new(
            QuestionId::new(id),
            QuestionKind::SingleChoiceText,
            "Pick",
            vec![AnswerOption::text("a"), AnswerOption::text("b")],
            AnswerKey::Option(0),
        )
        .unwrap()
    }

    fn record(lesson: LessonId, minutes: i64) -> LessonReportRecord {
        let started_at = fixed_now();
        LessonReportRecord {
            learner_id: LearnerId::new(1),
            lesson_id: lesson,
            report: LessonReport::completed(1, 1),
            started_at,
            finished_at: started_at + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn unknown_lesson_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo.load_questions(LessonId::first()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn questions_round_trip_in_order() {
        let repo = InMemoryRepository::new();
        let lesson = LessonId::new(1, 2).unwrap();
        repo.replace_questions(lesson, &[question("b"), question("a")])
            .await
            .unwrap();

        let loaded = repo.load_questions(lesson).await.unwrap();
        let ids: Vec<_> = loaded.iter().map(|q| q.id().as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(repo.list_lessons().await.unwrap(), vec![lesson]);
    }

    #[tokio::test]
    async fn reports_list_newest_first_per_lesson() {
        let repo = InMemoryRepository::new();
        let first = LessonId::first();
        let other = LessonId::new(1, 2).unwrap();

        let old = repo.append_report(&record(first, 1)).await.unwrap();
        let _other = repo.append_report(&record(other, 2)).await.unwrap();
        let new = repo.append_report(&record(first, 3)).await.unwrap();

        let rows = repo.list_reports(LearnerId::new(1), first, 10).await.unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new, old]);

        let limited = repo.list_reports(LearnerId::new(1), first, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(repo.get_report(old).await.unwrap(), record(first, 1));
    }

    #[tokio::test]
    async fn out_of_range_report_ids_are_not_found() {
        let repo = InMemoryRepository::new();
        repo.append_report(&record(LessonId::first(), 1)).await.unwrap();

        for id in [i64::MIN, -1, 0, 2, i64::MAX] {
            let err = repo.get_report(id).await.unwrap_err();
            assert!(matches!(err, StorageError::NotFound), "id {id}");
        }
    }

    #[tokio::test]
    async fn progress_is_absent_until_saved() {
        let repo = InMemoryRepository::new();
        let learner = LearnerId::new(7);
        assert_eq!(repo.get_progress(learner).await.unwrap(), None);

        let progress = LearnerProgress::new();
        repo.save_progress(learner, &progress).await.unwrap();
        assert_eq!(repo.get_progress(learner).await.unwrap(), Some(progress));
    }
}
