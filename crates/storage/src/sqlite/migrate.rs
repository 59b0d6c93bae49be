use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS lesson_questions (
            chapter INTEGER NOT NULL CHECK (chapter >= 1),
            set_number INTEGER NOT NULL CHECK (set_number >= 1),
            position INTEGER NOT NULL CHECK (position >= 0),
            question_id TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (chapter, set_number, position),
            UNIQUE (chapter, set_number, question_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS lesson_reports (
            id INTEGER PRIMARY KEY,
            learner_id INTEGER NOT NULL,
            chapter INTEGER NOT NULL,
            set_number INTEGER NOT NULL,
            outcome TEXT NOT NULL CHECK (outcome IN ('completed', 'failed', 'aborted')),
            correct_count INTEGER NOT NULL CHECK (correct_count >= 0),
            total_questions INTEGER CHECK (total_questions >= 1),
            score_percent INTEGER CHECK (score_percent BETWEEN 0 AND 100),
            questions_answered INTEGER CHECK (questions_answered >= 0),
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learner_progress (
            learner_id INTEGER PRIMARY KEY,
            xp INTEGER NOT NULL CHECK (xp >= 0),
            streak_count INTEGER NOT NULL CHECK (streak_count >= 0),
            streak_last_active TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS learner_unlocked (
            learner_id INTEGER NOT NULL,
            chapter INTEGER NOT NULL,
            set_number INTEGER NOT NULL,
            PRIMARY KEY (learner_id, chapter, set_number),
            FOREIGN KEY (learner_id) REFERENCES learner_progress(learner_id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_lesson_reports_learner_lesson_finished
            ON lesson_reports (learner_id, chapter, set_number, finished_at);
    ",
];

/// Runs pending schema migrations, recording each version in `schema_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
        ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;
        for statement in SCHEMA_V1 {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
