use lesson_core::model::{LearnerId, LessonId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, learner_id_to_i64, map_report_record, report_columns, ser};
use crate::repository::{LessonReportRecord, LessonReportRow, LessonReportSink, StorageError};

#[async_trait::async_trait]
impl LessonReportSink for SqliteRepository {
    async fn append_report(&self, record: &LessonReportRecord) -> Result<i64, StorageError> {
        let columns = report_columns(&record.report);

        let res = sqlx::query(
            r"
                INSERT INTO lesson_reports (
                    learner_id, chapter, set_number, outcome, correct_count,
                    total_questions, score_percent, questions_answered,
                    started_at, finished_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(learner_id_to_i64(record.learner_id)?)
        .bind(i64::from(record.lesson_id.chapter()))
        .bind(i64::from(record.lesson_id.set()))
        .bind(columns.outcome)
        .bind(columns.correct_count)
        .bind(columns.total_questions)
        .bind(columns.score_percent)
        .bind(columns.questions_answered)
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_report(&self, id: i64) -> Result<LessonReportRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    learner_id, chapter, set_number, outcome, correct_count,
                    total_questions, score_percent, questions_answered,
                    started_at, finished_at
                FROM lesson_reports
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_report_record(&row)
    }

    async fn list_reports(
        &self,
        learner: LearnerId,
        lesson: LessonId,
        limit: u32,
    ) -> Result<Vec<LessonReportRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, learner_id, chapter, set_number, outcome, correct_count,
                    total_questions, score_percent, questions_answered,
                    started_at, finished_at
                FROM lesson_reports
                WHERE learner_id = ?1 AND chapter = ?2 AND set_number = ?3
                ORDER BY finished_at DESC, id DESC
                LIMIT ?4
            ",
        )
        .bind(learner_id_to_i64(learner)?)
        .bind(i64::from(lesson.chapter()))
        .bind(i64::from(lesson.set()))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id").map_err(ser)?;
            out.push(LessonReportRow::new(id, map_report_record(&row)?));
        }
        Ok(out)
    }
}
