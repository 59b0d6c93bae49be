use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Opaque identifier of a question, unique within a lesson.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Creates a new `QuestionId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the underlying string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a learner
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LearnerId(u64);

impl LearnerId {
    /// Creates a new `LearnerId`
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Position of a lesson in the course: a numbered set inside a numbered chapter.
///
/// Both numbers start at 1. Ordering is chapter-major, so lessons sort in the
/// order a learner unlocks them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LessonId {
    chapter: u32,
    set: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonIdError {
    #[error("chapter and set numbers start at 1")]
    Zero,

    #[error("invalid lesson id: {0} (expected <chapter>-<set>)")]
    Malformed(String),
}

impl LessonId {
    /// Creates a new `LessonId`.
    ///
    /// # Errors
    ///
    /// Returns `LessonIdError::Zero` if either number is zero.
    pub fn new(chapter: u32, set: u32) -> Result<Self, LessonIdError> {
        if chapter == 0 || set == 0 {
            return Err(LessonIdError::Zero);
        }
        Ok(Self { chapter, set })
    }

    /// The first lesson of the course.
    #[must_use]
    pub fn first() -> Self {
        Self { chapter: 1, set: 1 }
    }

    #[must_use]
    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    #[must_use]
    pub fn set(&self) -> u32 {
        self.set
    }
}

impl FromStr for LessonId {
    type Err = LessonIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LessonIdError::Malformed(s.to_owned());
        let (chapter, set) = s.trim().split_once('-').ok_or_else(malformed)?;
        let chapter = chapter.parse::<u32>().map_err(|_| malformed())?;
        let set = set.parse::<u32>().map_err(|_| malformed())?;
        Self::new(chapter, set)
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Debug for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LearnerId({})", self.0)
    }
}

impl fmt::Debug for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LessonId({}-{})", self.chapter, self.set)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.chapter, self.set)
    }
}
