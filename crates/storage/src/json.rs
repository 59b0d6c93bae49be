//! Lesson content read from a directory of JSON files, one file per lesson.
//!
//! A lesson `2-3` lives in `<dir>/2-3.json`:
//!
//! ```json
//! { "questions": [ { "id": "q1", "type": "free-text", "prompt": "...", "expectedAnswer": "..." } ] }
//! ```

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lesson_core::model::{LessonCatalog, LessonId, Question};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::repository::{QuestionBank, StorageError};

#[derive(Debug, Deserialize)]
struct LessonFile {
    questions: Vec<Question>,
}

/// Question bank backed by `<dir>/<chapter>-<set>.json` files.
#[derive(Debug, Clone)]
pub struct JsonQuestionBank {
    dir: PathBuf,
}

impl JsonQuestionBank {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn lesson_path(&self, lesson: LessonId) -> PathBuf {
        self.dir.join(format!("{lesson}.json"))
    }

    /// Lessons present in the directory, in course order.
    ///
    /// Files whose stem is not a `<chapter>-<set>` pair are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the directory does not exist, or
    /// `StorageError::Connection` on other I/O failures.
    pub async fn list_lessons(&self) -> Result<Vec<LessonId>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        let mut lessons = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<LessonId>() {
                Ok(lesson) => lessons.push(lesson),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping file"),
            }
        }
        lessons.sort();
        Ok(lessons)
    }

    /// Build the course catalog from the files present.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the directory is missing or holds no
    /// lesson files, and `StorageError::Serialization` naming the missing file
    /// when a chapter skips a set number.
    pub async fn catalog(&self) -> Result<LessonCatalog, StorageError> {
        let lessons = self.list_lessons().await?;
        if lessons.is_empty() {
            return Err(StorageError::NotFound);
        }
        LessonCatalog::from_lessons(lessons)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

fn io_err(e: io::Error) -> StorageError {
    if e.kind() == io::ErrorKind::NotFound {
        StorageError::NotFound
    } else {
        StorageError::Connection(e.to_string())
    }
}

#[async_trait]
impl QuestionBank for JsonQuestionBank {
    async fn load_questions(&self, lesson: LessonId) -> Result<Vec<Question>, StorageError> {
        let path = self.lesson_path(lesson);
        let raw = tokio::fs::read(&path).await.map_err(io_err)?;
        let file: LessonFile = serde_json::from_slice(&raw).map_err(|e| {
            warn!(path = %path.display(), error = %e, "invalid lesson file");
            StorageError::Serialization(e.to_string())
        })?;
        debug!(%lesson, count = file.questions.len(), "loaded lesson file");
        Ok(file.questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{AnswerKey, QuestionKind};

    const LESSON: &str = r#"{
        "questions": [
            {
                "id": "q1",
                "type": "single-choice-text",
                "prompt": "Pick the greeting",
                "options": [{ "text": "hello" }, { "text": "chair" }],
                "correctOptionIndex": 0
            },
            {
                "id": "q2",
                "type": "free-text",
                "prompt": "Translate: شكرا",
                "expectedAnswer": "thanks",
                "explanation": "Literally 'thank you'."
            }
        ]
    }"#;

    fn lesson(chapter: u32, set: u32) -> LessonId {
        LessonId::new(chapter, set).unwrap()
    }

    #[tokio::test]
    async fn loads_questions_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1-1.json"), LESSON).unwrap();
        let bank = JsonQuestionBank::new(dir.path());

        let questions = bank.load_questions(lesson(1, 1)).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].kind(), QuestionKind::SingleChoiceText);
        assert_eq!(questions[0].key(), &AnswerKey::Option(0));
        assert_eq!(questions[1].explanation(), Some("Literally 'thank you'."));
    }

    #[tokio::test]
    async fn missing_lesson_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let bank = JsonQuestionBank::new(dir.path());
        let err = bank.load_questions(lesson(4, 2)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn invalid_question_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let broken = r#"{ "questions": [ { "id": "q", "type": "free-text", "prompt": "p" } ] }"#;
        std::fs::write(dir.path().join("1-1.json"), broken).unwrap();
        let bank = JsonQuestionBank::new(dir.path());

        let err = bank.load_questions(lesson(1, 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[tokio::test]
    async fn catalog_counts_sets_per_chapter() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1-1.json", "1-2.json", "2-1.json", "notes.txt", "draft.json"] {
            std::fs::write(dir.path().join(name), LESSON).unwrap();
        }
        let bank = JsonQuestionBank::new(dir.path());

        assert_eq!(
            bank.list_lessons().await.unwrap(),
            vec![lesson(1, 1), lesson(1, 2), lesson(2, 1)]
        );
        let catalog = bank.catalog().await.unwrap();
        assert_eq!(catalog.successor(lesson(1, 2)), Some(lesson(2, 1)));
        assert_eq!(catalog.successor(lesson(2, 1)), None);
    }

    #[tokio::test]
    async fn catalog_rejects_a_missing_set() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1-1.json", "1-3.json"] {
            std::fs::write(dir.path().join(name), LESSON).unwrap();
        }
        let bank = JsonQuestionBank::new(dir.path());

        let err = bank.catalog().await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(ref msg) if msg.contains("1-2")));
    }
}
