use chrono::{DateTime, Utc};
use std::sync::Arc;

use lesson_core::model::{LearnerId, LessonId, LessonOutcome, LessonReport};
use storage::repository::{LessonReportRecord, LessonReportRow, LessonReportSink};

use crate::error::LessonError;

/// Storage identifier for a persisted lesson report.
pub type LessonReportId = i64;

/// Presentation-agnostic list item for a lesson report.
///
/// Timestamps stay raw; the host formats them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonReportListItem {
    pub id: LessonReportId,
    pub finished_at: DateTime<Utc>,
    pub outcome: LessonOutcome,
    pub correct_count: u32,
    /// Only completed lessons carry a score.
    pub score_percent: Option<u8>,
}

impl LessonReportListItem {
    #[must_use]
    pub fn from_row(row: &LessonReportRow) -> Self {
        let report = row.record.report;
        let score_percent = match report {
            LessonReport::Completed { score_percent, .. } => Some(score_percent),
            LessonReport::Failed { .. } | LessonReport::Aborted { .. } => None,
        };
        Self {
            id: row.id,
            finished_at: row.record.finished_at,
            outcome: report.outcome(),
            correct_count: report.correct_count(),
            score_percent,
        }
    }
}

/// Read side of lesson reports.
#[derive(Clone)]
pub struct LessonReportService {
    reports: Arc<dyn LessonReportSink>,
}

impl LessonReportService {
    #[must_use]
    pub fn new(reports: Arc<dyn LessonReportSink>) -> Self {
        Self { reports }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(storage::repository::InMemoryRepository::new()))
    }

    /// Most recent reports of a learner for one lesson, newest first.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Storage` on repository failures.
    pub async fn list_recent_reports(
        &self,
        learner: LearnerId,
        lesson: LessonId,
        limit: u32,
    ) -> Result<Vec<LessonReportListItem>, LessonError> {
        let rows = self.reports.list_reports(learner, lesson, limit).await?;
        Ok(rows.iter().map(LessonReportListItem::from_row).collect())
    }

    /// Best score among the learner's recent completed runs of a lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Storage` on repository failures.
    pub async fn best_score(
        &self,
        learner: LearnerId,
        lesson: LessonId,
        limit: u32,
    ) -> Result<Option<u8>, LessonError> {
        let items = self.list_recent_reports(learner, lesson, limit).await?;
        Ok(items.iter().filter_map(|i| i.score_percent).max())
    }

    /// Fetch a report by ID.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::Storage` when repository access fails.
    pub async fn get_report(&self, id: LessonReportId) -> Result<LessonReportRecord, LessonError> {
        Ok(self.reports.get_report(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use lesson_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, StorageError};

    fn record(report: LessonReport, minutes: i64) -> LessonReportRecord {
        LessonReportRecord {
            learner_id: LearnerId::new(1),
            lesson_id: LessonId::first(),
            report,
            started_at: fixed_now(),
            finished_at: fixed_now() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn list_item_keeps_score_only_for_completed() {
        let completed = LessonReportRow::new(1, record(LessonReport::completed(2, 3), 1));
        let item = LessonReportListItem::from_row(&completed);
        assert_eq!(item.outcome, LessonOutcome::Completed);
        assert_eq!(item.score_percent, Some(67));

        let failed = LessonReportRow::new(
            2,
            record(
                LessonReport::Failed {
                    correct_count: 0,
                    total_questions: 3,
                },
                2,
            ),
        );
        assert_eq!(LessonReportListItem::from_row(&failed).score_percent, None);
    }

    #[tokio::test]
    async fn lists_recent_reports_and_best_score() {
        let repo = InMemoryRepository::new();
        repo.append_report(&record(LessonReport::completed(1, 2), 1))
            .await
            .unwrap();
        repo.append_report(&record(LessonReport::completed(2, 2), 2))
            .await
            .unwrap();
        let aborted = repo
            .append_report(&record(
                LessonReport::Aborted {
                    correct_count: 0,
                    questions_answered: 0,
                },
                3,
            ))
            .await
            .unwrap();

        let svc = LessonReportService::new(Arc::new(repo));
        let items = svc
            .list_recent_reports(LearnerId::new(1), LessonId::first(), 10)
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, aborted);
        assert_eq!(items[0].outcome, LessonOutcome::Aborted);

        let best = svc
            .best_score(LearnerId::new(1), LessonId::first(), 10)
            .await
            .unwrap();
        assert_eq!(best, Some(100));
    }

    #[tokio::test]
    async fn missing_report_surfaces_storage_error() {
        let svc = LessonReportService::in_memory();
        let err = svc.get_report(5).await.unwrap_err();
        assert!(matches!(err, LessonError::Storage(StorageError::NotFound)));
    }
}
