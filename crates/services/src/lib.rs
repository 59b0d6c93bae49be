#![forbid(unsafe_code)]

pub mod error;
pub mod lessons;
pub mod progress_service;

pub use lesson_core::Clock;

pub use error::{LessonError, ProgressServiceError};
pub use progress_service::{LearnerProgressService, LessonStatus};

pub use lessons::{
    LessonFinish, LessonLoopService, LessonReportId, LessonReportListItem, LessonReportService,
    LessonRun,
};
