use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::ids::LessonId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("catalog must contain at least one chapter")]
    EmptyCatalog,

    #[error("chapter numbers start at 1")]
    ZeroChapter,

    #[error("chapter {chapter} must contain at least one set")]
    EmptyChapter { chapter: u32 },

    #[error("lesson {0} is not part of the catalog")]
    UnknownLesson(LessonId),

    #[error("lesson {0} is missing from its chapter")]
    MissingLesson(LessonId),

    #[error("progress must keep at least one unlocked lesson")]
    NothingUnlocked,
}

//
// ─── CATALOG ──────────────────────────────────────────────────────────────────
//

/// Shape of the course: how many sets each chapter holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonCatalog {
    chapters: BTreeMap<u32, u32>,
}

impl LessonCatalog {
    /// Build a catalog from `(chapter, set_count)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError` if the catalog is empty, a chapter is numbered 0,
    /// or a chapter has no sets.
    pub fn new(chapters: impl IntoIterator<Item = (u32, u32)>) -> Result<Self, ProgressError> {
        let chapters: BTreeMap<u32, u32> = chapters.into_iter().collect();
        if chapters.is_empty() {
            return Err(ProgressError::EmptyCatalog);
        }
        for (&chapter, &sets) in &chapters {
            if chapter == 0 {
                return Err(ProgressError::ZeroChapter);
            }
            if sets == 0 {
                return Err(ProgressError::EmptyChapter { chapter });
            }
        }
        Ok(Self { chapters })
    }

    /// Build a catalog from the lessons that exist.
    ///
    /// Every chapter must hold sets `1..=n` without holes, since completing a
    /// set unlocks the next number. Chapter numbers may skip.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::EmptyCatalog` if `lessons` is empty and
    /// `ProgressError::MissingLesson` naming the first hole in a chapter.
    pub fn from_lessons(
        lessons: impl IntoIterator<Item = LessonId>,
    ) -> Result<Self, ProgressError> {
        let mut sets_by_chapter: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for lesson in lessons {
            sets_by_chapter
                .entry(lesson.chapter())
                .or_default()
                .insert(lesson.set());
        }

        let mut chapters = BTreeMap::new();
        for (chapter, sets) in sets_by_chapter {
            let mut expected = 1;
            for set in sets {
                if set != expected {
                    let missing =
                        LessonId::new(chapter, expected).map_err(|_| ProgressError::ZeroChapter)?;
                    return Err(ProgressError::MissingLesson(missing));
                }
                expected += 1;
            }
            chapters.insert(chapter, expected - 1);
        }
        Self::new(chapters)
    }

    #[must_use]
    pub fn contains(&self, lesson: LessonId) -> bool {
        self.chapters
            .get(&lesson.chapter())
            .is_some_and(|&sets| lesson.set() <= sets)
    }

    /// The lesson unlocked by completing `lesson`: the next set of the same
    /// chapter, else the first set of the following chapter.
    #[must_use]
    pub fn successor(&self, lesson: LessonId) -> Option<LessonId> {
        let sets = *self.chapters.get(&lesson.chapter())?;
        if lesson.set() < sets {
            return LessonId::new(lesson.chapter(), lesson.set() + 1).ok();
        }
        let (&next_chapter, _) = self
            .chapters
            .range(lesson.chapter().saturating_add(1)..)
            .next()?;
        LessonId::new(next_chapter, 1).ok()
    }

    /// All lessons in unlock order.
    pub fn lessons(&self) -> impl Iterator<Item = LessonId> + '_ {
        self.chapters.iter().flat_map(|(&chapter, &sets)| {
            (1..=sets).filter_map(move |set| LessonId::new(chapter, set).ok())
        })
    }
}

//
// ─── STREAK ───────────────────────────────────────────────────────────────────
//

/// Consecutive days with at least one completed lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Streak {
    count: u32,
    last_active: Option<NaiveDate>,
}

impl Streak {
    #[must_use]
    pub fn from_persisted(count: u32, last_active: Option<NaiveDate>) -> Self {
        Self { count, last_active }
    }

    /// Record activity on `today`.
    pub fn touch(&mut self, today: NaiveDate) {
        self.count = match self.last_active {
            Some(last) if last == today => self.count.max(1),
            Some(last) if last.succ_opt() == Some(today) => self.count.saturating_add(1),
            // Activity dated before the last recorded day does not move the streak.
            Some(last) if last > today => return,
            _ => 1,
        };
        self.last_active = Some(today);
    }

    /// Streak as seen on `today`: zero once a full day was missed.
    #[must_use]
    pub fn current(&self, today: NaiveDate) -> u32 {
        match self.last_active {
            Some(last) if last == today || last.succ_opt() == Some(today) => self.count,
            _ => 0,
        }
    }

    /// Stored count, regardless of whether it has lapsed.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn last_active(&self) -> Option<NaiveDate> {
        self.last_active
    }
}

//
// ─── LEARNER PROGRESS ─────────────────────────────────────────────────────────
//

/// What a completed lesson changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEffect {
    pub xp_awarded: u32,
    pub newly_unlocked: Option<LessonId>,
    pub streak: u32,
}

/// Course-level state of a learner: XP, unlocked lessons and daily streak.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProgress {
    xp: u64,
    unlocked: BTreeSet<LessonId>,
    streak: Streak,
}

/// XP granted for each completed lesson.
pub const XP_PER_LESSON: u32 = 1;

impl LearnerProgress {
    /// Fresh progress: only the first lesson unlocked, no XP.
    #[must_use]
    pub fn new() -> Self {
        Self {
            xp: 0,
            unlocked: BTreeSet::from([LessonId::first()]),
            streak: Streak::default(),
        }
    }

    /// Rehydrate progress from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NothingUnlocked` if `unlocked` is empty.
    pub fn from_persisted(
        xp: u64,
        unlocked: impl IntoIterator<Item = LessonId>,
        streak: Streak,
    ) -> Result<Self, ProgressError> {
        let unlocked: BTreeSet<_> = unlocked.into_iter().collect();
        if unlocked.is_empty() {
            return Err(ProgressError::NothingUnlocked);
        }
        Ok(Self {
            xp,
            unlocked,
            streak,
        })
    }

    #[must_use]
    pub fn xp(&self) -> u64 {
        self.xp
    }

    #[must_use]
    pub fn streak(&self) -> Streak {
        self.streak
    }

    #[must_use]
    pub fn is_unlocked(&self, lesson: LessonId) -> bool {
        self.unlocked.contains(&lesson)
    }

    pub fn unlocked(&self) -> impl Iterator<Item = LessonId> + '_ {
        self.unlocked.iter().copied()
    }

    /// Apply a completed lesson: award XP, unlock its successor, touch the streak.
    ///
    /// Replaying a lesson still awards XP; unlocking is idempotent.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownLesson` if the catalog does not contain `lesson`.
    pub fn record_completion(
        &mut self,
        lesson: LessonId,
        catalog: &LessonCatalog,
        completed_at: DateTime<Utc>,
    ) -> Result<CompletionEffect, ProgressError> {
        if !catalog.contains(lesson) {
            return Err(ProgressError::UnknownLesson(lesson));
        }

        self.xp = self.xp.saturating_add(u64::from(XP_PER_LESSON));
        self.unlocked.insert(lesson);

        let newly_unlocked = catalog
            .successor(lesson)
            .filter(|next| self.unlocked.insert(*next));

        let today = completed_at.date_naive();
        self.streak.touch(today);

        Ok(CompletionEffect {
            xp_awarded: XP_PER_LESSON,
            newly_unlocked,
            streak: self.streak.current(today),
        })
    }
}

impl Default for LearnerProgress {
    fn default() -> Self {
        Self::new()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn lesson(chapter: u32, set: u32) -> LessonId {
        LessonId::new(chapter, set).unwrap()
    }

    fn catalog() -> LessonCatalog {
        LessonCatalog::new([(1, 2), (2, 1)]).unwrap()
    }

    #[test]
    fn successor_walks_sets_then_chapters() {
        let catalog = catalog();
        assert_eq!(catalog.successor(lesson(1, 1)), Some(lesson(1, 2)));
        assert_eq!(catalog.successor(lesson(1, 2)), Some(lesson(2, 1)));
        assert_eq!(catalog.successor(lesson(2, 1)), None);
        assert_eq!(catalog.lessons().count(), 3);
    }

    #[test]
    fn catalog_from_lessons_counts_sets() {
        let catalog = LessonCatalog::from_lessons([
            lesson(4, 1),
            lesson(1, 2),
            lesson(1, 1),
            lesson(1, 2),
        ])
        .unwrap();
        assert!(catalog.contains(lesson(1, 2)));
        assert!(!catalog.contains(lesson(1, 3)));
        assert_eq!(catalog.successor(lesson(1, 2)), Some(lesson(4, 1)));
        assert_eq!(
            LessonCatalog::from_lessons([]).unwrap_err(),
            ProgressError::EmptyCatalog
        );
    }

    #[test]
    fn catalog_from_lessons_rejects_holes() {
        assert_eq!(
            LessonCatalog::from_lessons([lesson(1, 1), lesson(1, 3), lesson(2, 1)]).unwrap_err(),
            ProgressError::MissingLesson(lesson(1, 2))
        );
        assert_eq!(
            LessonCatalog::from_lessons([lesson(1, 1), lesson(2, 2)]).unwrap_err(),
            ProgressError::MissingLesson(lesson(2, 1))
        );
    }

    #[test]
    fn catalog_rejects_empty_chapters() {
        assert_eq!(
            LessonCatalog::new([(1, 0)]).unwrap_err(),
            ProgressError::EmptyChapter { chapter: 1 }
        );
        assert_eq!(
            LessonCatalog::new(Vec::new()).unwrap_err(),
            ProgressError::EmptyCatalog
        );
    }

    #[test]
    fn completion_awards_xp_and_unlocks_next() {
        let mut progress = LearnerProgress::new();
        let effect = progress
            .record_completion(lesson(1, 1), &catalog(), fixed_now())
            .unwrap();

        assert_eq!(effect.xp_awarded, 1);
        assert_eq!(effect.newly_unlocked, Some(lesson(1, 2)));
        assert_eq!(effect.streak, 1);
        assert_eq!(progress.xp(), 1);
        assert!(progress.is_unlocked(lesson(1, 2)));

        let replay = progress
            .record_completion(lesson(1, 1), &catalog(), fixed_now())
            .unwrap();
        assert_eq!(replay.newly_unlocked, None);
        assert_eq!(progress.xp(), 2);
    }

    #[test]
    fn unknown_lesson_leaves_progress_untouched() {
        let mut progress = LearnerProgress::new();
        let err = progress
            .record_completion(lesson(9, 1), &catalog(), fixed_now())
            .unwrap_err();
        assert_eq!(err, ProgressError::UnknownLesson(lesson(9, 1)));
        assert_eq!(progress, LearnerProgress::new());
    }

    #[test]
    fn streak_counts_consecutive_days_and_resets_after_gap() {
        let day0 = fixed_now().date_naive();
        let mut streak = Streak::default();
        streak.touch(day0);
        streak.touch(day0);
        assert_eq!(streak.count(), 1);

        let day1 = (fixed_now() + Duration::days(1)).date_naive();
        streak.touch(day1);
        assert_eq!(streak.count(), 2);
        assert_eq!(streak.current(day1), 2);

        let day3 = (fixed_now() + Duration::days(3)).date_naive();
        assert_eq!(streak.current(day3), 0);
        streak.touch(day3);
        assert_eq!(streak.count(), 1);
    }
}
