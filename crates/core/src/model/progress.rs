use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, ProgressId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown interaction type: {0}")]
    UnknownInteraction(String),

    #[error("quiz score must be between 0 and 100, got {0}")]
    InvalidScore(u32),
}

//
// ─── INTERACTION ───────────────────────────────────────────────────────────────
//

/// How a learner finished a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    View,
    Quiz,
}

impl InteractionType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionType::View => "VIEW",
            InteractionType::Quiz => "QUIZ",
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressError::UnknownInteraction` for unrecognized values.
    pub fn parse(s: &str) -> Result<Self, ProgressError> {
        match s {
            "VIEW" => Ok(InteractionType::View),
            "QUIZ" => Ok(InteractionType::Quiz),
            other => Err(ProgressError::UnknownInteraction(other.to_owned())),
        }
    }
}

//
// ─── COMPLETION RECORD ─────────────────────────────────────────────────────────
//

/// Append-only evidence that a learner finished a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonCompletionRecord {
    pub lesson_id: LessonId,
    #[serde(rename = "type")]
    pub interaction: InteractionType,
    /// Percent score for quiz interactions.
    pub score: Option<u32>,
    pub completed_at: DateTime<Utc>,
}

impl LessonCompletionRecord {
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidScore` when a score exceeds 100.
    pub fn new(
        lesson_id: LessonId,
        interaction: InteractionType,
        score: Option<u32>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if let Some(score) = score {
            if score > 100 {
                return Err(ProgressError::InvalidScore(score));
            }
        }
        Ok(Self {
            lesson_id,
            interaction,
            score,
            completed_at,
        })
    }
}

//
// ─── PERCENTAGE ────────────────────────────────────────────────────────────────
//

/// `round(100 * completed / total)` with half-up rounding; 100 for empty courses.
///
/// Completions beyond `total` (lessons deleted after completion) are clamped.
#[must_use]
pub fn completion_percentage(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let completed = completed.min(total);
    let pct = (200 * completed + total) / (2 * total);
    u8::try_from(pct).unwrap_or(100)
}

//
// ─── COURSE PROGRESS ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseProgress {
    pub id: ProgressId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub progress_percentage: u8,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_lessons: Vec<LessonCompletionRecord>,
}

/// What a recalculation changed, so callers can fire completion hooks once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recalculation {
    pub percentage: u8,
    pub newly_completed: bool,
}

impl CourseProgress {
    #[must_use]
    pub fn has_completed(&self, lesson_id: LessonId) -> bool {
        self.completed_lessons
            .iter()
            .any(|record| record.lesson_id == lesson_id)
    }

    /// Number of distinct lessons with a completion record.
    #[must_use]
    pub fn distinct_completed(&self) -> u64 {
        let distinct: HashSet<LessonId> = self
            .completed_lessons
            .iter()
            .map(|record| record.lesson_id)
            .collect();
        distinct.len() as u64
    }

    /// Recomputes the percentage against the course's current lesson count.
    ///
    /// Reaching 100% stamps `completed_at` (an existing stamp is kept);
    /// anything lower clears it.
    pub fn recalculate(&mut self, total_lessons: u64, now: DateTime<Utc>) -> Recalculation {
        let percentage = completion_percentage(self.distinct_completed(), total_lessons);
        let was_completed = self.completed_at.is_some();
        self.progress_percentage = percentage;
        if percentage == 100 {
            if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
        } else {
            self.completed_at = None;
        }
        Recalculation {
            percentage,
            newly_completed: !was_completed && self.completed_at.is_some(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn empty_progress() -> CourseProgress {
        CourseProgress {
            id: ProgressId::new(1),
            user_id: UserId::new(1),
            course_id: CourseId::new(1),
            progress_percentage: 0,
            completed_at: None,
            completed_lessons: Vec::new(),
        }
    }

    fn complete(progress: &mut CourseProgress, lesson: u64) {
        progress.completed_lessons.push(
            LessonCompletionRecord::new(
                LessonId::new(lesson),
                InteractionType::View,
                None,
                fixed_now(),
            )
            .unwrap(),
        );
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(completion_percentage(1, 4), 25);
        assert_eq!(completion_percentage(1, 3), 33);
        assert_eq!(completion_percentage(2, 3), 67);
        assert_eq!(completion_percentage(1, 8), 13);
        assert_eq!(completion_percentage(4, 4), 100);
    }

    #[test]
    fn empty_course_is_complete() {
        assert_eq!(completion_percentage(0, 0), 100);
        let mut progress = empty_progress();
        let recalc = progress.recalculate(0, fixed_now());
        assert_eq!(recalc.percentage, 100);
        assert!(recalc.newly_completed);
        assert_eq!(progress.completed_at, Some(fixed_now()));
    }

    #[test]
    fn four_lesson_course_walkthrough() {
        let mut progress = empty_progress();
        complete(&mut progress, 1);
        assert_eq!(progress.recalculate(4, fixed_now()).percentage, 25);
        assert!(progress.completed_at.is_none());

        for lesson in 2..=4 {
            complete(&mut progress, lesson);
        }
        let recalc = progress.recalculate(4, fixed_now());
        assert_eq!(recalc.percentage, 100);
        assert!(recalc.newly_completed);
        assert!(progress.is_complete());
    }

    #[test]
    fn duplicate_records_count_once() {
        let mut progress = empty_progress();
        complete(&mut progress, 1);
        complete(&mut progress, 1);
        assert_eq!(progress.distinct_completed(), 1);
        assert_eq!(progress.recalculate(2, fixed_now()).percentage, 50);
    }

    #[test]
    fn existing_completion_stamp_is_kept() {
        let mut progress = empty_progress();
        complete(&mut progress, 1);
        progress.recalculate(1, fixed_now());
        let later = fixed_now() + Duration::days(2);
        let recalc = progress.recalculate(1, later);
        assert!(!recalc.newly_completed);
        assert_eq!(progress.completed_at, Some(fixed_now()));
    }

    #[test]
    fn new_lessons_reopen_a_completed_course() {
        let mut progress = empty_progress();
        complete(&mut progress, 1);
        progress.recalculate(1, fixed_now());
        let recalc = progress.recalculate(2, fixed_now());
        assert_eq!(recalc.percentage, 50);
        assert!(progress.completed_at.is_none());
    }

    #[test]
    fn quiz_score_is_bounded() {
        let err = LessonCompletionRecord::new(
            LessonId::new(1),
            InteractionType::Quiz,
            Some(101),
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, ProgressError::InvalidScore(101));
    }
}
