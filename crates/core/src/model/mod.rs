mod ids;
mod progress;
mod question;
mod report;
mod selection;
mod settings;

pub use ids::{LearnerId, LessonId, LessonIdError, QuestionId};

pub use progress::{
    CompletionEffect, LearnerProgress, LessonCatalog, ProgressError, Streak, XP_PER_LESSON,
};
pub use question::{AnswerKey, AnswerOption, Question, QuestionError, QuestionKind, QuestionRecord};
pub use report::{LessonOutcome, LessonReport, score_percent};
pub use selection::{Selection, SelectionError};
pub use settings::{DEFAULT_MAX_LIVES, LessonSettings, SettingsError};
