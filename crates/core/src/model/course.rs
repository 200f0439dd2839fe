use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CourseId, FormId, LessonId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("lesson title cannot be empty")]
    EmptyLessonTitle,

    #[error("course is already published")]
    AlreadyPublished,

    #[error("archived courses cannot be published")]
    Archived,

    #[error("unknown course status: {0}")]
    UnknownStatus(String),
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::Draft => "DRAFT",
            CourseStatus::Published => "PUBLISHED",
            CourseStatus::Archived => "ARCHIVED",
        }
    }

    /// # Errors
    ///
    /// Returns `CourseError::UnknownStatus` for unrecognized values.
    pub fn parse(s: &str) -> Result<Self, CourseError> {
        match s {
            "DRAFT" => Ok(CourseStatus::Draft),
            "PUBLISHED" => Ok(CourseStatus::Published),
            "ARCHIVED" => Ok(CourseStatus::Archived),
            other => Err(CourseError::UnknownStatus(other.to_owned())),
        }
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub instructor_id: UserId,
    pub status: CourseStatus,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Course {
    /// Moves a draft course to `Published`, stamping `published_at`.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::AlreadyPublished` or `CourseError::Archived`.
    pub fn publish(&mut self, now: DateTime<Utc>) -> Result<(), CourseError> {
        match self.status {
            CourseStatus::Draft => {
                self.status = CourseStatus::Published;
                self.published_at = Some(now);
                Ok(())
            }
            CourseStatus::Published => Err(CourseError::AlreadyPublished),
            CourseStatus::Archived => Err(CourseError::Archived),
        }
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.status == CourseStatus::Published
    }

    /// Owners and administrators may edit a course.
    #[must_use]
    pub fn is_managed_by(&self, user: UserId, is_admin: bool) -> bool {
        is_admin || self.instructor_id == user
    }
}

/// Validated input for a new course; always created as a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    pub title: String,
    pub description: Option<String>,
    pub instructor_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl NewCourse {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` when the trimmed title is empty.
    pub fn new(
        title: impl Into<String>,
        description: Option<String>,
        instructor_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(CourseError::EmptyTitle);
        }
        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());
        Ok(Self {
            title,
            description,
            instructor_id,
            created_at,
        })
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lesson {
    pub id: LessonId,
    pub course_id: CourseId,
    pub title: String,
    pub position: u32,
    /// Quiz embedded in the lesson, if any.
    pub quiz_form_id: Option<FormId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLesson {
    pub course_id: CourseId,
    pub title: String,
    pub quiz_form_id: Option<FormId>,
}

impl NewLesson {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyLessonTitle` when the trimmed title is empty.
    pub fn new(
        course_id: CourseId,
        title: impl Into<String>,
        quiz_form_id: Option<FormId>,
    ) -> Result<Self, CourseError> {
        let title = title.into().trim().to_owned();
        if title.is_empty() {
            return Err(CourseError::EmptyLessonTitle);
        }
        Ok(Self {
            course_id,
            title,
            quiz_form_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn draft() -> Course {
        Course {
            id: CourseId::new(1),
            title: "Onboarding".into(),
            description: None,
            instructor_id: UserId::new(9),
            status: CourseStatus::Draft,
            created_at: fixed_now(),
            published_at: None,
        }
    }

    #[test]
    fn publish_stamps_timestamp_once() {
        let mut course = draft();
        course.publish(fixed_now()).unwrap();
        assert!(course.is_published());
        assert_eq!(course.published_at, Some(fixed_now()));
        assert_eq!(
            course.publish(fixed_now()).unwrap_err(),
            CourseError::AlreadyPublished
        );
    }

    #[test]
    fn archived_course_cannot_publish() {
        let mut course = draft();
        course.status = CourseStatus::Archived;
        assert_eq!(course.publish(fixed_now()).unwrap_err(), CourseError::Archived);
    }

    #[test]
    fn new_course_requires_title() {
        let err = NewCourse::new("   ", None, UserId::new(1), fixed_now()).unwrap_err();
        assert_eq!(err, CourseError::EmptyTitle);
    }

    #[test]
    fn blank_description_is_dropped() {
        let course = NewCourse::new("Safety", Some("  ".into()), UserId::new(1), fixed_now())
            .unwrap();
        assert_eq!(course.description, None);
    }

    #[test]
    fn ownership_check() {
        let course = draft();
        assert!(course.is_managed_by(UserId::new(9), false));
        assert!(!course.is_managed_by(UserId::new(2), false));
        assert!(course.is_managed_by(UserId::new(2), true));
    }
}
