//! Shared error types for the services crate.

use thiserror::Error;

use nexus_core::model::{
    AnnouncementError, CalendarError, ChatError, CourseError, FormError, ProgressError,
    SettingsError, UserError,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("too many login attempts")]
    RateLimited,
    #[error("administrator role required")]
    Forbidden,
    #[error("public registration is disabled")]
    RegistrationClosed,
    #[error("email already registered")]
    EmailTaken,
    #[error("password hashing failed: {0}")]
    PasswordHash(String),
    #[error("session lifetime is out of range")]
    SessionTtlOutOfRange,
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CourseService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseServiceError {
    #[error("not allowed to manage this course")]
    Forbidden,
    #[error("course not found")]
    NotFound,
    #[error("lesson quiz must reference an existing quiz form")]
    InvalidQuizForm,
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FormService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FormServiceError {
    #[error("not allowed to manage this form")]
    Forbidden,
    #[error("form not found")]
    NotFound,
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("course not found")]
    CourseNotFound,
    #[error("lesson not found")]
    LessonNotFound,
    #[error("course is not published")]
    CourseNotPublished,
    #[error("not enrolled in this course")]
    NotEnrolled,
    #[error("already enrolled in this course")]
    AlreadyEnrolled,
    #[error("lesson does not belong to this course")]
    LessonNotInCourse,
    #[error("lesson has no quiz")]
    NoQuiz,
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Form(#[from] FormServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CalendarService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CalendarServiceError {
    #[error("not allowed to manage this event")]
    Forbidden,
    #[error("event not found")]
    NotFound,
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `GamificationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GamificationError {
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `NotificationService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NotificationError {
    #[error("notification not found")]
    NotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AnnouncementService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnnouncementServiceError {
    #[error("only instructors and administrators can post announcements")]
    Forbidden,
    #[error(transparent)]
    Announcement(#[from] AnnouncementError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ChatService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatServiceError {
    #[error("not a participant of this conversation")]
    Forbidden,
    #[error("conversation not found")]
    NotFound,
    #[error("recipient not found")]
    RecipientNotFound,
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsServiceError {
    #[error("administrator role required")]
    Forbidden,
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by mail transports.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmailError {
    #[error("email provider returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}
