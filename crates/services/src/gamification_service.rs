use std::sync::Arc;

use nexus_core::model::gamification::{completion_milestone, slugs};
use nexus_core::model::{Achievement, CourseId, NewNotification, UserAchievement, UserId, XpGrant};
use serde::Serialize;
use storage::repository::{
    CourseRepository, GamificationRepository, ProgressRepository, StorageError, UserRepository,
};
use tracing::{debug, info};

use crate::Clock;
use crate::error::GamificationError;
use crate::notification_service::NotificationService;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GamificationSummary {
    pub xp: u32,
    pub achievements: Vec<UserAchievement>,
}

/// XP and achievement grants, plus the triggers fired by learning events.
#[derive(Clone)]
pub struct GamificationService {
    clock: Clock,
    users: Arc<dyn UserRepository>,
    achievements: Arc<dyn GamificationRepository>,
    progress: Arc<dyn ProgressRepository>,
    courses: Arc<dyn CourseRepository>,
    notifications: NotificationService,
}

impl GamificationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        users: Arc<dyn UserRepository>,
        achievements: Arc<dyn GamificationRepository>,
        progress: Arc<dyn ProgressRepository>,
        courses: Arc<dyn CourseRepository>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            clock,
            users,
            achievements,
            progress,
            courses,
            notifications,
        }
    }

    /// Unconditional XP increment. Returns the new total.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if the user is missing or storage fails.
    pub async fn add_xp(&self, user_id: UserId, points: u32) -> Result<u32, GamificationError> {
        let total = self.users.add_xp(user_id, points).await?;
        debug!(user = %user_id, points, total, "xp added");
        Ok(total)
    }

    /// Add a one-time grant's XP. Returns the new total, or `None` when the
    /// user already received it.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if the user is missing or storage fails.
    pub async fn grant_once(
        &self,
        user_id: UserId,
        grant: XpGrant,
    ) -> Result<Option<u32>, GamificationError> {
        let total = self
            .achievements
            .grant_xp_once(user_id, grant, self.clock.now())
            .await?;
        match total {
            Some(total) => debug!(user = %user_id, grant = %grant.key(), total, "xp granted"),
            None => debug!(user = %user_id, grant = %grant.key(), "xp already granted"),
        }
        Ok(total)
    }

    /// Grant an achievement once. Returns whether a new unlock happened.
    ///
    /// Unknown slugs are ignored. A concurrent duplicate grant surfaces as a
    /// storage conflict and counts as already unlocked.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError` on storage or notification failures.
    pub async fn award_achievement(
        &self,
        user_id: UserId,
        slug: &str,
    ) -> Result<bool, GamificationError> {
        let Some(achievement) = self.achievements.find_achievement(slug).await? else {
            debug!(slug, "unknown achievement slug");
            return Ok(false);
        };
        if self
            .achievements
            .has_achievement(user_id, &achievement)
            .await?
        {
            return Ok(false);
        }

        let total = match self
            .achievements
            .grant_achievement(user_id, &achievement, self.clock.now())
            .await
        {
            Ok(total) => total,
            Err(StorageError::Conflict) => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        info!(user = %user_id, slug, total, "achievement unlocked");

        self.notifications
            .notify(vec![NewNotification {
                user_id,
                title: format!("Achievement unlocked: {}", achievement.name),
                description: Some(achievement.description.clone()),
                link: Some("/profile".into()),
            }])
            .await?;
        Ok(true)
    }

    /// Fires after an enrollment is created.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError` on storage failures.
    pub async fn on_enrolled(&self, user_id: UserId) -> Result<(), GamificationError> {
        if self.progress.count_enrollments(user_id).await? == 1 {
            self.award_achievement(user_id, slugs::FIRST_ENROLLMENT)
                .await?;
        }
        Ok(())
    }

    /// Fires when a course transitions to complete. Completion XP is paid
    /// once per course, however often the learner re-enrolls.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError` on storage failures.
    pub async fn on_course_completed(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<(), GamificationError> {
        self.grant_once(user_id, XpGrant::CourseCompleted(course_id))
            .await?;
        let completed = self.progress.count_completed_courses(user_id).await?;
        if let Some(slug) = completion_milestone(completed) {
            self.award_achievement(user_id, slug).await?;
        }
        Ok(())
    }

    /// Fires after an instructor publishes a course.
    ///
    /// # Errors
    ///
    /// Returns `GamificationError` on storage failures.
    pub async fn on_course_published(
        &self,
        instructor_id: UserId,
    ) -> Result<(), GamificationError> {
        if self.courses.count_published_by(instructor_id).await? == 1 {
            self.award_achievement(instructor_id, slugs::FIRST_COURSE_PUBLISHED)
                .await?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if the user is missing or storage fails.
    pub async fn summary(&self, user_id: UserId) -> Result<GamificationSummary, GamificationError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        let achievements = self.achievements.list_user_achievements(user_id).await?;
        Ok(GamificationSummary {
            xp: user.xp,
            achievements,
        })
    }

    /// # Errors
    ///
    /// Returns `GamificationError::Storage` if repository access fails.
    pub async fn catalog(&self) -> Result<Vec<Achievement>, GamificationError> {
        Ok(self.achievements.list_achievements().await?)
    }
}
