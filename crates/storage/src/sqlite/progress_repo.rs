use chrono::NaiveDate;
use lesson_core::model::{LearnerId, LearnerProgress, Streak};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, learner_id_to_i64, lesson_id_from_row, ser, u32_from_i64};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        learner: LearnerId,
    ) -> Result<Option<LearnerProgress>, StorageError> {
        let learner_id = learner_id_to_i64(learner)?;

        let Some(row) = sqlx::query(
            r"
                SELECT xp, streak_count, streak_last_active
                FROM learner_progress
                WHERE learner_id = ?1
            ",
        )
        .bind(learner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        else {
            return Ok(None);
        };

        let xp: i64 = row.try_get("xp").map_err(ser)?;
        let xp = u64::try_from(xp)
            .map_err(|_| StorageError::Serialization(format!("invalid xp: {xp}")))?;
        let streak_count = u32_from_i64(
            "streak_count",
            row.try_get::<i64, _>("streak_count").map_err(ser)?,
        )?;
        let last_active: Option<NaiveDate> = row.try_get("streak_last_active").map_err(ser)?;

        let unlocked_rows = sqlx::query(
            r"
                SELECT chapter, set_number
                FROM learner_unlocked
                WHERE learner_id = ?1
                ORDER BY chapter ASC, set_number ASC
            ",
        )
        .bind(learner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let unlocked = unlocked_rows
            .iter()
            .map(lesson_id_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        LearnerProgress::from_persisted(
            xp,
            unlocked,
            Streak::from_persisted(streak_count, last_active),
        )
        .map(Some)
        .map_err(ser)
    }

    async fn save_progress(
        &self,
        learner: LearnerId,
        progress: &LearnerProgress,
    ) -> Result<(), StorageError> {
        let learner_id = learner_id_to_i64(learner)?;
        let xp = i64::try_from(progress.xp())
            .map_err(|_| StorageError::Serialization("xp overflow".into()))?;
        let streak = progress.streak();

        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
                INSERT INTO learner_progress (learner_id, xp, streak_count, streak_last_active)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(learner_id) DO UPDATE SET
                    xp = excluded.xp,
                    streak_count = excluded.streak_count,
                    streak_last_active = excluded.streak_last_active
            ",
        )
        .bind(learner_id)
        .bind(xp)
        .bind(i64::from(streak.count()))
        .bind(streak.last_active())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM learner_unlocked WHERE learner_id = ?1")
            .bind(learner_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for lesson in progress.unlocked() {
            sqlx::query(
                r"
                    INSERT INTO learner_unlocked (learner_id, chapter, set_number)
                    VALUES (?1, ?2, ?3)
                ",
            )
            .bind(learner_id)
            .bind(i64::from(lesson.chapter()))
            .bind(i64::from(lesson.set()))
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
