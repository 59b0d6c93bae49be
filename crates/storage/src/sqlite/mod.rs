use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use thiserror::Error;

use crate::repository::{
    LessonContentRepository, LessonReportSink, ProgressRepository, QuestionBank, Storage,
};

mod mapping;
mod migrate;
mod progress_repo;
mod question_repo;
mod report_repo;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Pool tuning for a single learner's database.
///
/// Writes come in short bursts at the end of a lesson (one report, one
/// progress upsert), so a small pool with WAL and `synchronous = NORMAL` is
/// enough; the busy timeout covers a concurrent `import`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqliteConfig {
    pub max_connections: u32,
    pub busy_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL and default tuning.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is invalid or the connection
    /// cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, SqliteConfig::default()).await
    }

    /// Connect with explicit pool tuning.
    ///
    /// Foreign keys are always enforced: unlocked lessons cascade with their
    /// learner's progress row.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the URL is invalid or the connection
    /// cannot be established.
    pub async fn connect_with(
        database_url: &str,
        config: SqliteConfig,
    ) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(config.busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;
        tracing::debug!(max_connections = config.max_connections, "sqlite pool ready");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let questions: Arc<dyn QuestionBank> = Arc::new(repo.clone());
        let content: Arc<dyn LessonContentRepository> = Arc::new(repo.clone());
        let reports: Arc<dyn LessonReportSink> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Ok(Self {
            questions,
            content,
            reports,
            progress,
        })
    }
}
