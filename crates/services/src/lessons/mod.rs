mod view;
mod workflow;

// Public API of the lesson subsystem.
pub use crate::error::LessonError;
pub use view::{LessonReportId, LessonReportListItem, LessonReportService};
pub use workflow::{LessonFinish, LessonLoopService, LessonRun};
