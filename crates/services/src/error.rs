//! Shared error types for the services crate.

use thiserror::Error;

use lesson_core::EngineError;
use lesson_core::model::{LessonId, ProgressError};
use storage::repository::StorageError;

/// Errors emitted by lesson services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson {0} is locked")]
    Locked(LessonId),
    #[error("lesson has not reached a final state")]
    NotTerminal,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `LearnerProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
