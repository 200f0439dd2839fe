use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ids::{AchievementId, CourseId, LessonId, UserId};

/// XP granted every time a learner finishes a lesson for the first time.
pub const XP_LESSON_COMPLETED: u32 = 10;

/// XP granted when a course reaches 100%.
pub const XP_COURSE_COMPLETED: u32 = 100;

/// XP that a learner can earn only once per lesson or course, even across
/// unenroll and re-enroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XpGrant {
    LessonCompleted(LessonId),
    CourseCompleted(CourseId),
}

impl XpGrant {
    /// Stable identifier stored alongside the user.
    #[must_use]
    pub fn key(self) -> String {
        match self {
            Self::LessonCompleted(id) => format!("lesson:{id}"),
            Self::CourseCompleted(id) => format!("course:{id}"),
        }
    }

    #[must_use]
    pub fn points(self) -> u32 {
        match self {
            Self::LessonCompleted(_) => XP_LESSON_COMPLETED,
            Self::CourseCompleted(_) => XP_COURSE_COMPLETED,
        }
    }
}

/// Slugs of the seeded achievement catalog.
pub mod slugs {
    pub const FIRST_ENROLLMENT: &str = "first-enrollment";
    pub const FIRST_COURSE_COMPLETED: &str = "first-course-completed";
    pub const FIVE_COURSES_COMPLETED: &str = "five-courses-completed";
    pub const FIRST_COURSE_PUBLISHED: &str = "first-course-published";
}

/// Seed row for the achievement catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub slug: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: u32,
}

pub const CATALOG: [CatalogEntry; 4] = [
    CatalogEntry {
        slug: slugs::FIRST_ENROLLMENT,
        name: "First Steps",
        description: "Enrolled in your first course.",
        points: 10,
    },
    CatalogEntry {
        slug: slugs::FIRST_COURSE_COMPLETED,
        name: "Graduate",
        description: "Completed your first course.",
        points: 50,
    },
    CatalogEntry {
        slug: slugs::FIVE_COURSES_COMPLETED,
        name: "Lifelong Learner",
        description: "Completed five courses.",
        points: 150,
    },
    CatalogEntry {
        slug: slugs::FIRST_COURSE_PUBLISHED,
        name: "Author",
        description: "Published your first course.",
        points: 50,
    },
];

/// Completed-course counts that unlock an achievement.
pub const COMPLETION_MILESTONES: [(u64, &str); 2] = [
    (1, slugs::FIRST_COURSE_COMPLETED),
    (5, slugs::FIVE_COURSES_COMPLETED),
];

/// Catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub points: u32,
}

/// Per-user unlock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAchievement {
    pub user_id: UserId,
    pub achievement: Achievement,
    pub unlocked_at: DateTime<Utc>,
}

/// Milestone slug reached by exactly `completed` courses, if any.
#[must_use]
pub fn completion_milestone(completed: u64) -> Option<&'static str> {
    COMPLETION_MILESTONES
        .iter()
        .find(|(count, _)| *count == completed)
        .map(|(_, slug)| *slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestones_fire_on_exact_counts() {
        assert_eq!(completion_milestone(1), Some(slugs::FIRST_COURSE_COMPLETED));
        assert_eq!(completion_milestone(2), None);
        assert_eq!(completion_milestone(5), Some(slugs::FIVE_COURSES_COMPLETED));
        assert_eq!(completion_milestone(6), None);
    }
}
