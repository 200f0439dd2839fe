use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::model::{
    Achievement, Announcement, CalendarEvent, ChatMessage, Conversation, ConversationId, Course,
    CourseId, CourseProgress, EventDraft, EventId, Form, FormDraft, FormId, FormResponse,
    FormStatus, Lesson, LessonCompletionRecord, LessonId, MessageId, NewAnnouncement, NewCourse,
    NewLesson, NewNotification, NewSecurityLog, NewUser, Notification, NotificationId,
    PlatformSettings, ProgressId, Role, SecurityLog, SubmittedAnswer, User, UserAchievement,
    UserId, XpGrant,
};
use nexus_core::recurrence::DateRange;
use thiserror::Error;

use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// A user together with the stored password hash, only read on login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Enrollment plus the initial state of its progress row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub progress_percentage: u8,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFormResponse {
    pub form_id: FormId,
    pub user_id: UserId,
    pub submitted_at: DateTime<Utc>,
    pub score: Option<u32>,
    pub max_score: Option<u32>,
    pub answers: Vec<SubmittedAnswer>,
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a validated user with its password hash.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` when the email is already taken.
    async fn insert_user(
        &self,
        user: &NewUser,
        password_hash: &str,
        created_at: DateTime<Utc>,
    ) -> Result<User, StorageError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Look up credentials by normalized email.
    async fn find_credentials(&self, email: &str)
    -> Result<Option<UserCredentials>, StorageError>;

    /// Users ordered by id, optionally restricted to one role.
    async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn update_role(&self, id: UserId, role: Role) -> Result<User, StorageError>;

    /// Increment XP and return the new total.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user does not exist.
    async fn add_xp(&self, id: UserId, points: u32) -> Result<u32, StorageError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create_session(&self, session: &SessionRecord) -> Result<(), StorageError>;

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>, StorageError>;

    async fn delete_session(&self, token: &str) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn insert_course(&self, course: &NewCourse) -> Result<Course, StorageError>;

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    async fn list_courses(&self) -> Result<Vec<Course>, StorageError>;

    /// Persist status and publication stamp.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn update_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Append a lesson at the end of the course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn insert_lesson(&self, lesson: &NewLesson) -> Result<Lesson, StorageError>;

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Lessons ordered by position.
    async fn list_lessons(&self, course_id: CourseId) -> Result<Vec<Lesson>, StorageError>;

    async fn count_lessons(&self, course_id: CourseId) -> Result<u64, StorageError>;

    async fn count_published_by(&self, instructor_id: UserId) -> Result<u64, StorageError>;
}

/// Enrollments and the progress rows that belong to them.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Create the enrollment and its progress row atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user is already enrolled.
    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<CourseProgress, StorageError>;

    /// Remove completions, progress and the enrollment atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user is not enrolled.
    async fn unenroll(&self, user_id: UserId, course_id: CourseId) -> Result<(), StorageError>;

    async fn count_enrollments(&self, user_id: UserId) -> Result<u64, StorageError>;

    /// Progress row with its completion records.
    async fn get_progress(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<CourseProgress>, StorageError>;

    async fn list_progress(&self, user_id: UserId) -> Result<Vec<CourseProgress>, StorageError>;

    /// Insert a completion record.
    ///
    /// Returns `false` without writing when the lesson was already completed.
    async fn insert_completion(
        &self,
        progress_id: ProgressId,
        record: &LessonCompletionRecord,
    ) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the progress row does not exist.
    async fn update_progress(
        &self,
        progress_id: ProgressId,
        percentage: u8,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), StorageError>;

    async fn count_completed_courses(&self, user_id: UserId) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait FormRepository: Send + Sync {
    /// Persist a validated draft, assigning question and option ids.
    async fn insert_form(
        &self,
        draft: &FormDraft,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Form, StorageError>;

    async fn get_form(&self, id: FormId) -> Result<Option<Form>, StorageError>;

    async fn list_forms(&self) -> Result<Vec<Form>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the form does not exist.
    async fn update_form_status(&self, id: FormId, status: FormStatus)
    -> Result<(), StorageError>;

    /// Delete a form with its questions and responses.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the form does not exist.
    async fn delete_form(&self, id: FormId) -> Result<(), StorageError>;

    async fn insert_response(
        &self,
        response: &NewFormResponse,
    ) -> Result<FormResponse, StorageError>;

    async fn list_responses(&self, form_id: FormId) -> Result<Vec<FormResponse>, StorageError>;
}

#[async_trait]
pub trait CalendarRepository: Send + Sync {
    async fn insert_event(
        &self,
        draft: &EventDraft,
        created_by: UserId,
    ) -> Result<CalendarEvent, StorageError>;

    /// Replace an event definition, keeping its creator.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the event does not exist.
    async fn update_event(
        &self,
        id: EventId,
        draft: &EventDraft,
    ) -> Result<CalendarEvent, StorageError>;

    async fn get_event(&self, id: EventId) -> Result<Option<CalendarEvent>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the event does not exist.
    async fn delete_event(&self, id: EventId) -> Result<(), StorageError>;

    /// Base events that may produce an occurrence inside `range`.
    ///
    /// Recurring events are included when their series has started before
    /// the range ends and has not ended before it starts.
    async fn list_candidate_events(
        &self,
        range: DateRange,
    ) -> Result<Vec<CalendarEvent>, StorageError>;
}

#[async_trait]
pub trait GamificationRepository: Send + Sync {
    async fn list_achievements(&self) -> Result<Vec<Achievement>, StorageError>;

    async fn find_achievement(&self, slug: &str) -> Result<Option<Achievement>, StorageError>;

    async fn has_achievement(
        &self,
        user_id: UserId,
        achievement: &Achievement,
    ) -> Result<bool, StorageError>;

    /// Create the unlock row and add the achievement's points atomically.
    /// Returns the user's new XP total.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user already holds it.
    async fn grant_achievement(
        &self,
        user_id: UserId,
        achievement: &Achievement,
        unlocked_at: DateTime<Utc>,
    ) -> Result<u32, StorageError>;

    /// Record a one-time XP grant and add its points atomically.
    ///
    /// Returns the new XP total, or `None` when the user already received
    /// this grant.
    async fn grant_xp_once(
        &self,
        user_id: UserId,
        grant: XpGrant,
        granted_at: DateTime<Utc>,
    ) -> Result<Option<u32>, StorageError>;

    /// Unlocks, oldest first.
    async fn list_user_achievements(
        &self,
        user_id: UserId,
    ) -> Result<Vec<UserAchievement>, StorageError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert_notifications(
        &self,
        notifications: &[NewNotification],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<Notification>, StorageError>;

    /// Newest first.
    async fn list_notifications(&self, user_id: UserId)
    -> Result<Vec<Notification>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` unless the notification belongs to `user_id`.
    async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<(), StorageError>;

    /// Returns how many notifications changed.
    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError>;
}

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    async fn insert_announcement(
        &self,
        announcement: &NewAnnouncement,
    ) -> Result<Announcement, StorageError>;

    /// Newest first.
    async fn list_announcements(&self) -> Result<Vec<Announcement>, StorageError>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Fetch the conversation for a sorted participant pair, creating it if needed.
    async fn find_or_create_conversation(
        &self,
        participants: [UserId; 2],
        at: DateTime<Utc>,
    ) -> Result<Conversation, StorageError>;

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StorageError>;

    /// Conversations including `user_id`, most recently active first.
    async fn list_conversations(&self, user_id: UserId)
    -> Result<Vec<Conversation>, StorageError>;

    /// Insert a message and bump the conversation's `updated_at` atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the conversation does not exist.
    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<ChatMessage, StorageError>;

    /// Messages oldest first.
    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, StorageError>;

    async fn get_message(&self, id: MessageId) -> Result<Option<ChatMessage>, StorageError>;
}

#[async_trait]
pub trait SecurityLogRepository: Send + Sync {
    async fn insert_log(&self, log: &NewSecurityLog) -> Result<SecurityLog, StorageError>;

    /// Newest first, at most `limit` rows.
    async fn list_logs(&self, limit: u32) -> Result<Vec<SecurityLog>, StorageError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_settings(&self) -> Result<Option<PlatformSettings>, StorageError>;

    async fn save_settings(&self, settings: &PlatformSettings) -> Result<(), StorageError>;
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates every repository behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub forms: Arc<dyn FormRepository>,
    pub calendar: Arc<dyn CalendarRepository>,
    pub gamification: Arc<dyn GamificationRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub announcements: Arc<dyn AnnouncementRepository>,
    pub chat: Arc<dyn ChatRepository>,
    pub security_logs: Arc<dyn SecurityLogRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    /// Wire a single repository implementing every contract into all slots.
    pub fn from_repository<R>(repo: R) -> Self
    where
        R: UserRepository
            + SessionRepository
            + CourseRepository
            + ProgressRepository
            + FormRepository
            + CalendarRepository
            + GamificationRepository
            + NotificationRepository
            + AnnouncementRepository
            + ChatRepository
            + SecurityLogRepository
            + SettingsRepository
            + 'static,
    {
        let repo = Arc::new(repo);
        Self {
            users: repo.clone(),
            sessions: repo.clone(),
            courses: repo.clone(),
            progress: repo.clone(),
            forms: repo.clone(),
            calendar: repo.clone(),
            gamification: repo.clone(),
            notifications: repo.clone(),
            announcements: repo.clone(),
            chat: repo.clone(),
            security_logs: repo.clone(),
            settings: repo,
        }
    }
}
