use std::sync::Arc;

use nexus_core::model::{Course, CourseId, FormId, Lesson, NewCourse, NewLesson, User};
use serde::Serialize;
use storage::repository::{CourseRepository, FormRepository};
use tracing::{info, warn};

use crate::Clock;
use crate::error::CourseServiceError;
use crate::gamification_service::GamificationService;

/// A course with its ordered lessons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub lessons: Vec<Lesson>,
}

/// Course authoring and the catalog view.
#[derive(Clone)]
pub struct CourseService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    forms: Arc<dyn FormRepository>,
    gamification: GamificationService,
}

impl CourseService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        forms: Arc<dyn FormRepository>,
        gamification: GamificationService,
    ) -> Self {
        Self {
            clock,
            courses,
            forms,
            gamification,
        }
    }

    /// Create a draft course owned by `actor`.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Forbidden` for students.
    /// Returns `CourseServiceError::Course` if validation fails.
    pub async fn create_course(
        &self,
        actor: &User,
        title: &str,
        description: Option<String>,
    ) -> Result<Course, CourseServiceError> {
        if !actor.role.can_author() {
            return Err(CourseServiceError::Forbidden);
        }
        let draft = NewCourse::new(title, description, actor.id, self.clock.now())?;
        let course = self.courses.insert_course(&draft).await?;
        info!(course = %course.id, instructor = %actor.id, "course created");
        Ok(course)
    }

    /// Append a lesson, optionally gated by a quiz form.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::InvalidQuizForm` when `quiz_form_id` is
    /// missing or not a quiz.
    pub async fn add_lesson(
        &self,
        actor: &User,
        course_id: CourseId,
        title: &str,
        quiz_form_id: Option<FormId>,
    ) -> Result<Lesson, CourseServiceError> {
        let course = self.managed_course(actor, course_id).await?;
        if let Some(form_id) = quiz_form_id {
            let is_quiz = self
                .forms
                .get_form(form_id)
                .await?
                .is_some_and(|form| form.is_quiz);
            if !is_quiz {
                return Err(CourseServiceError::InvalidQuizForm);
            }
        }
        let lesson = NewLesson::new(course.id, title, quiz_form_id)?;
        Ok(self.courses.insert_lesson(&lesson).await?)
    }

    /// Move a draft course to published and fire the author trigger.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::Course` if the course is not a draft.
    pub async fn publish(
        &self,
        actor: &User,
        course_id: CourseId,
    ) -> Result<Course, CourseServiceError> {
        let mut course = self.managed_course(actor, course_id).await?;
        course.publish(self.clock.now())?;
        self.courses.update_course(&course).await?;
        info!(course = %course.id, "course published");

        if let Err(err) = self
            .gamification
            .on_course_published(course.instructor_id)
            .await
        {
            warn!(course = %course.id, error = %err, "publish trigger failed");
        }
        Ok(course)
    }

    /// Drafts are only visible to their instructor and administrators.
    ///
    /// # Errors
    ///
    /// Returns `CourseServiceError::NotFound` when missing or hidden.
    pub async fn get_course(
        &self,
        viewer: &User,
        course_id: CourseId,
    ) -> Result<CourseDetail, CourseServiceError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .filter(|course| visible_to(course, viewer))
            .ok_or(CourseServiceError::NotFound)?;
        let lessons = self.courses.list_lessons(course.id).await?;
        Ok(CourseDetail { course, lessons })
    }

    /// # Errors
    ///
    /// Returns `CourseServiceError::Storage` if repository access fails.
    pub async fn list_courses(&self, viewer: &User) -> Result<Vec<Course>, CourseServiceError> {
        let courses = self.courses.list_courses().await?;
        Ok(courses
            .into_iter()
            .filter(|course| visible_to(course, viewer))
            .collect())
    }

    async fn managed_course(
        &self,
        actor: &User,
        course_id: CourseId,
    ) -> Result<Course, CourseServiceError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(CourseServiceError::NotFound)?;
        if !course.is_managed_by(actor.id, actor.role.is_admin()) {
            return Err(CourseServiceError::Forbidden);
        }
        Ok(course)
    }
}

fn visible_to(course: &Course, viewer: &User) -> bool {
    course.is_published() || course.is_managed_by(viewer.id, viewer.role.is_admin())
}

