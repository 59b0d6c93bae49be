use thiserror::Error;

use crate::engine::EngineError;
use crate::model::{LessonIdError, ProgressError, QuestionError, SelectionError, SettingsError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    LessonId(#[from] LessonIdError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LessonId;

    #[test]
    fn module_errors_convert_and_keep_their_message() {
        let err: Error = "7".parse::<LessonId>().unwrap_err().into();
        assert!(matches!(err, Error::LessonId(_)));
        assert_eq!(
            err.to_string(),
            "invalid lesson id: 7 (expected <chapter>-<set>)"
        );

        let err: Error = EngineError::EmptyLesson.into();
        assert_eq!(err.to_string(), "lesson has no questions");
    }
}
