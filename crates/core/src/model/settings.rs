use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lives a learner starts a lesson with unless configured otherwise.
pub const DEFAULT_MAX_LIVES: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("max lives must be > 0")]
    InvalidMaxLives,
}

/// Per-lesson engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSettings")]
pub struct LessonSettings {
    max_lives: u32,
}

impl LessonSettings {
    /// Creates custom lesson settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidMaxLives` if `max_lives` is zero.
    pub fn new(max_lives: u32) -> Result<Self, SettingsError> {
        if max_lives == 0 {
            return Err(SettingsError::InvalidMaxLives);
        }
        Ok(Self { max_lives })
    }

    #[must_use]
    pub fn max_lives(&self) -> u32 {
        self.max_lives
    }
}

impl Default for LessonSettings {
    fn default() -> Self {
        Self {
            max_lives: DEFAULT_MAX_LIVES,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(default = "default_max_lives")]
    max_lives: u32,
}

fn default_max_lives() -> u32 {
    DEFAULT_MAX_LIVES
}

impl TryFrom<RawSettings> for LessonSettings {
    type Error = SettingsError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        Self::new(raw.max_lives)
    }
}
