use lesson_core::model::{LearnerId, LessonId, LessonReport};
use sqlx::Row;

use crate::repository::{LessonReportRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn learner_id_to_i64(learner: LearnerId) -> Result<i64, StorageError> {
    i64::try_from(learner.value())
        .map_err(|_| StorageError::Serialization("learner_id overflow".into()))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    u64::try_from(v)
        .map(LearnerId::new)
        .map_err(|_| StorageError::Serialization("learner_id sign overflow".into()))
}

pub(crate) fn lesson_id_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<LessonId, StorageError> {
    let chapter = u32_from_i64("chapter", row.try_get::<i64, _>("chapter").map_err(ser)?)?;
    let set = u32_from_i64("set_number", row.try_get::<i64, _>("set_number").map_err(ser)?)?;
    LessonId::new(chapter, set).map_err(ser)
}

/// Column values of a report: outcome label plus the counters that apply to it.
pub(crate) struct ReportColumns {
    pub outcome: &'static str,
    pub correct_count: i64,
    pub total_questions: Option<i64>,
    pub score_percent: Option<i64>,
    pub questions_answered: Option<i64>,
}

pub(crate) fn report_columns(report: &LessonReport) -> ReportColumns {
    let outcome = report.outcome().as_str();
    match *report {
        LessonReport::Completed {
            correct_count,
            total_questions,
            score_percent,
        } => ReportColumns {
            outcome,
            correct_count: i64::from(correct_count),
            total_questions: Some(i64::from(total_questions)),
            score_percent: Some(i64::from(score_percent)),
            questions_answered: None,
        },
        LessonReport::Failed {
            correct_count,
            total_questions,
        } => ReportColumns {
            outcome,
            correct_count: i64::from(correct_count),
            total_questions: Some(i64::from(total_questions)),
            score_percent: None,
            questions_answered: None,
        },
        LessonReport::Aborted {
            correct_count,
            questions_answered,
        } => ReportColumns {
            outcome,
            correct_count: i64::from(correct_count),
            total_questions: None,
            score_percent: None,
            questions_answered: Some(i64::from(questions_answered)),
        },
    }
}

fn required(field: &'static str, v: Option<i64>) -> Result<u32, StorageError> {
    let v = v.ok_or_else(|| StorageError::Serialization(format!("missing {field}")))?;
    u32_from_i64(field, v)
}

pub(crate) fn map_report(row: &sqlx::sqlite::SqliteRow) -> Result<LessonReport, StorageError> {
    let outcome: String = row.try_get("outcome").map_err(ser)?;
    let correct_count = u32_from_i64(
        "correct_count",
        row.try_get::<i64, _>("correct_count").map_err(ser)?,
    )?;
    let total: Option<i64> = row.try_get("total_questions").map_err(ser)?;

    match outcome.as_str() {
        "completed" => {
            let score: Option<i64> = row.try_get("score_percent").map_err(ser)?;
            let score = required("score_percent", score)?;
            Ok(LessonReport::Completed {
                correct_count,
                total_questions: required("total_questions", total)?,
                score_percent: u8::try_from(score)
                    .map_err(|_| StorageError::Serialization(format!("invalid score: {score}")))?,
            })
        }
        "failed" => Ok(LessonReport::Failed {
            correct_count,
            total_questions: required("total_questions", total)?,
        }),
        "aborted" => {
            let answered: Option<i64> = row.try_get("questions_answered").map_err(ser)?;
            Ok(LessonReport::Aborted {
                correct_count,
                questions_answered: required("questions_answered", answered)?,
            })
        }
        other => Err(StorageError::Serialization(format!(
            "invalid outcome: {other}"
        ))),
    }
}

pub(crate) fn map_report_record(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<LessonReportRecord, StorageError> {
    Ok(LessonReportRecord {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        lesson_id: lesson_id_from_row(row)?,
        report: map_report(row)?,
        started_at: row.try_get("started_at").map_err(ser)?,
        finished_at: row.try_get("finished_at").map_err(ser)?,
    })
}
