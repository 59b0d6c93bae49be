use lesson_core::model::{LessonId, Question};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, lesson_id_from_row, ser};
use crate::repository::{LessonContentRepository, QuestionBank, StorageError};

#[async_trait::async_trait]
impl QuestionBank for SqliteRepository {
    async fn load_questions(&self, lesson: LessonId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT body
                FROM lesson_questions
                WHERE chapter = ?1 AND set_number = ?2
                ORDER BY position ASC
            ",
        )
        .bind(i64::from(lesson.chapter()))
        .bind(i64::from(lesson.set()))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        if rows.is_empty() {
            return Err(StorageError::NotFound);
        }

        rows.iter()
            .map(|row| {
                let body: String = row.try_get("body").map_err(ser)?;
                serde_json::from_str::<Question>(&body).map_err(ser)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl LessonContentRepository for SqliteRepository {
    async fn replace_questions(
        &self,
        lesson: LessonId,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let chapter = i64::from(lesson.chapter());
        let set = i64::from(lesson.set());
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM lesson_questions WHERE chapter = ?1 AND set_number = ?2")
            .bind(chapter)
            .bind(set)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in questions.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            let body = serde_json::to_string(question).map_err(ser)?;
            sqlx::query(
                r"
                    INSERT INTO lesson_questions (chapter, set_number, position, question_id, body)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(chapter)
            .bind(set)
            .bind(position)
            .bind(question.id().as_str())
            .bind(body)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
                other => conn(other),
            })?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn list_lessons(&self) -> Result<Vec<LessonId>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT DISTINCT chapter, set_number
                FROM lesson_questions
                ORDER BY chapter ASC, set_number ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(lesson_id_from_row).collect()
    }
}
