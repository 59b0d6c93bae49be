use serde::{Deserialize, Serialize};

/// How a lesson session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LessonOutcome {
    Completed,
    Failed,
    Aborted,
}

impl LessonOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

/// Terminal report emitted once a session reaches a final state.
///
/// Plain data: the host reads it after `advance()` or `abort()` and performs
/// any persistence itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum LessonReport {
    Completed {
        correct_count: u32,
        total_questions: u32,
        score_percent: u8,
    },
    Failed {
        correct_count: u32,
        total_questions: u32,
    },
    Aborted {
        correct_count: u32,
        questions_answered: u32,
    },
}

impl LessonReport {
    /// Build a `Completed` report, rounding the score half up.
    ///
    /// `total_questions` is never zero for a report produced by the engine; a
    /// zero total yields a score of 0.
    #[must_use]
    pub fn completed(correct_count: u32, total_questions: u32) -> Self {
        Self::Completed {
            correct_count,
            total_questions,
            score_percent: score_percent(correct_count, total_questions),
        }
    }

    #[must_use]
    pub fn outcome(&self) -> LessonOutcome {
        match self {
            Self::Completed { .. } => LessonOutcome::Completed,
            Self::Failed { .. } => LessonOutcome::Failed,
            Self::Aborted { .. } => LessonOutcome::Aborted,
        }
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        match self {
            Self::Completed { correct_count, .. }
            | Self::Failed { correct_count, .. }
            | Self::Aborted { correct_count, .. } => *correct_count,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// `round(correct / total * 100)`, computed in integers.
#[must_use]
pub fn score_percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let rounded = (correct * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(3, 3), 100);
        assert_eq!(score_percent(0, 4), 0);
    }

    #[test]
    fn serializes_with_outcome_tag() {
        let json = serde_json::to_value(LessonReport::completed(2, 2)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "outcome": "completed",
                "correctCount": 2,
                "totalQuestions": 2,
                "scorePercent": 100
            })
        );

        let aborted = LessonReport::Aborted {
            correct_count: 1,
            questions_answered: 1,
        };
        let json = serde_json::to_value(aborted).unwrap();
        assert_eq!(json["outcome"], "aborted");
        assert_eq!(json["questionsAnswered"], 1);
    }
}
