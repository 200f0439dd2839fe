use std::sync::Arc;

use nexus_core::model::{
    CourseId, CourseProgress, FormResponse, FormSubmission, InteractionType, Lesson,
    LessonCompletionRecord, LessonId, Recalculation, User, UserId, XpGrant, completion_percentage,
};
use nexus_core::scoring::ScoreSummary;
use serde::Serialize;
use storage::repository::{CourseRepository, NewEnrollment, ProgressRepository, StorageError};
use tracing::{info, warn};

use crate::Clock;
use crate::error::{FormServiceError, ProgressServiceError};
use crate::form_service::FormService;
use crate::gamification_service::GamificationService;

/// Result of completing a lesson through any interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonOutcome {
    /// False when the lesson had already been completed.
    pub recorded: bool,
    pub course_completed: bool,
    pub progress: CourseProgress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
    pub response: FormResponse,
    pub percent: Option<u32>,
    #[serde(flatten)]
    pub outcome: LessonOutcome,
}

/// Enrollment and lesson progress tracking.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    progress: Arc<dyn ProgressRepository>,
    forms: FormService,
    gamification: GamificationService,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        progress: Arc<dyn ProgressRepository>,
        forms: FormService,
        gamification: GamificationService,
    ) -> Self {
        Self {
            clock,
            courses,
            progress,
            forms,
            gamification,
        }
    }

    /// Enroll `user_id` in a published course.
    ///
    /// A course without lessons is complete immediately.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::CourseNotPublished` for drafts and
    /// `ProgressServiceError::AlreadyEnrolled` on a duplicate.
    pub async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        let course = self
            .courses
            .get_course(course_id)
            .await?
            .ok_or(ProgressServiceError::CourseNotFound)?;
        if !course.is_published() {
            return Err(ProgressServiceError::CourseNotPublished);
        }

        let now = self.clock.now();
        let total = self.courses.count_lessons(course_id).await?;
        let enrollment = NewEnrollment {
            user_id,
            course_id,
            enrolled_at: now,
            progress_percentage: completion_percentage(0, total),
            completed_at: (total == 0).then_some(now),
        };
        let progress = match self.progress.enroll(&enrollment).await {
            Ok(progress) => progress,
            Err(StorageError::Conflict) => return Err(ProgressServiceError::AlreadyEnrolled),
            Err(err) => return Err(err.into()),
        };
        info!(user = %user_id, course = %course_id, "enrolled");

        if let Err(err) = self.gamification.on_enrolled(user_id).await {
            warn!(user = %user_id, error = %err, "enrollment trigger failed");
        }
        if progress.is_complete() {
            self.course_completed(user_id, course_id).await;
        }
        Ok(progress)
    }

    /// Remove the enrollment together with its progress and completions.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotEnrolled` if there is nothing to remove.
    pub async fn unenroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), ProgressServiceError> {
        match self.progress.unenroll(user_id, course_id).await {
            Ok(()) => {
                info!(user = %user_id, course = %course_id, "unenrolled");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(ProgressServiceError::NotEnrolled),
            Err(err) => Err(err.into()),
        }
    }

    /// Store a completion record unless the lesson is already complete.
    ///
    /// Returns whether a new record was written.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::LessonNotInCourse` when the lesson
    /// belongs elsewhere and `ProgressServiceError::NotEnrolled` without a
    /// progress row.
    pub async fn record_lesson_interaction(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lesson_id: LessonId,
        interaction: InteractionType,
        score: Option<u32>,
    ) -> Result<bool, ProgressServiceError> {
        self.course_lesson(course_id, lesson_id).await?;
        let progress = self.enrolled(user_id, course_id).await?;
        if progress.has_completed(lesson_id) {
            return Ok(false);
        }
        let record = LessonCompletionRecord::new(lesson_id, interaction, score, self.clock.now())?;
        Ok(self.progress.insert_completion(progress.id, &record).await?)
    }

    /// Recompute the completion percentage from the stored records.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotEnrolled` without a progress row.
    pub async fn recalculate_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(CourseProgress, Recalculation), ProgressServiceError> {
        let mut progress = self.enrolled(user_id, course_id).await?;
        let total = self.courses.count_lessons(course_id).await?;
        let recalculation = progress.recalculate(total, self.clock.now());
        self.progress
            .update_progress(progress.id, progress.progress_percentage, progress.completed_at)
            .await?;
        Ok((progress, recalculation))
    }

    /// Mark a lesson as viewed.
    ///
    /// # Errors
    ///
    /// See [`Self::record_lesson_interaction`].
    pub async fn complete_lesson(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<LessonOutcome, ProgressServiceError> {
        self.apply(user_id, course_id, lesson_id, InteractionType::View, None)
            .await
    }

    /// Grade the lesson's quiz and complete the lesson with the percent score.
    ///
    /// Completion does not depend on the score.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NoQuiz` if the lesson has no quiz and
    /// `ProgressServiceError::Form` when the submission is rejected.
    pub async fn submit_lesson_quiz(
        &self,
        user: &User,
        course_id: CourseId,
        lesson_id: LessonId,
        submission: FormSubmission,
    ) -> Result<QuizOutcome, ProgressServiceError> {
        let lesson = self.course_lesson(course_id, lesson_id).await?;
        let form_id = lesson.quiz_form_id.ok_or(ProgressServiceError::NoQuiz)?;
        self.enrolled(user.id, course_id).await?;

        let form = self
            .forms
            .load(form_id)
            .await?
            .ok_or(FormServiceError::NotFound)?;
        let response = self.forms.submit_to(&form, user, submission).await?;
        let percent = ScoreSummary {
            score: response.score,
            max_score: response.max_score,
        }
        .percent();

        let outcome = self
            .apply(user.id, course_id, lesson_id, InteractionType::Quiz, percent)
            .await?;
        Ok(QuizOutcome {
            response,
            percent,
            outcome,
        })
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotEnrolled` without a progress row.
    pub async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        self.enrolled(user_id, course_id).await
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn list_progress(
        &self,
        user_id: UserId,
    ) -> Result<Vec<CourseProgress>, ProgressServiceError> {
        Ok(self.progress.list_progress(user_id).await?)
    }

    async fn apply(
        &self,
        user_id: UserId,
        course_id: CourseId,
        lesson_id: LessonId,
        interaction: InteractionType,
        score: Option<u32>,
    ) -> Result<LessonOutcome, ProgressServiceError> {
        let recorded = self
            .record_lesson_interaction(user_id, course_id, lesson_id, interaction, score)
            .await?;
        if !recorded {
            let progress = self.enrolled(user_id, course_id).await?;
            return Ok(LessonOutcome {
                recorded,
                course_completed: false,
                progress,
            });
        }

        let (progress, recalculation) = self.recalculate_progress(user_id, course_id).await?;
        if let Err(err) = self
            .gamification
            .grant_once(user_id, XpGrant::LessonCompleted(lesson_id))
            .await
        {
            warn!(user = %user_id, error = %err, "lesson xp not granted");
        }
        if recalculation.newly_completed {
            self.course_completed(user_id, course_id).await;
        }
        Ok(LessonOutcome {
            recorded,
            course_completed: recalculation.newly_completed,
            progress,
        })
    }

    async fn course_completed(&self, user_id: UserId, course_id: CourseId) {
        info!(user = %user_id, course = %course_id, "course completed");
        if let Err(err) = self.gamification.on_course_completed(user_id, course_id).await {
            warn!(user = %user_id, error = %err, "completion trigger failed");
        }
    }

    async fn course_lesson(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Lesson, ProgressServiceError> {
        let lesson = self
            .courses
            .get_lesson(lesson_id)
            .await?
            .ok_or(ProgressServiceError::LessonNotFound)?;
        if lesson.course_id != course_id {
            return Err(ProgressServiceError::LessonNotInCourse);
        }
        Ok(lesson)
    }

    async fn enrolled(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseProgress, ProgressServiceError> {
        self.progress
            .get_progress(user_id, course_id)
            .await?
            .ok_or(ProgressServiceError::NotEnrolled)
    }
}
