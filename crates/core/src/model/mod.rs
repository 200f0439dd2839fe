mod calendar;
mod chat;
mod course;
mod form;
pub mod gamification;
mod ids;
mod notification;
mod progress;
mod security;
mod settings;
mod user;

pub use ids::{
    AchievementId, AnnouncementId, ConversationId, CourseId, EventId, FormId, LessonId, MessageId,
    NotificationId, OptionId, ParseIdError, ProgressId, QuestionId, ResponseId, SecurityLogId,
    UserId,
};

pub use calendar::{
    Audience, CalendarError, CalendarEvent, EventDraft, Occurrence, Recurrence,
};
pub use chat::{
    ChatError, ChatMessage, Conversation, MAX_MESSAGE_LEN, participant_pair, validate_message,
};
pub use course::{Course, CourseError, CourseStatus, Lesson, NewCourse, NewLesson};
pub use form::{
    AnswerOption, Form, FormDraft, FormError, FormResponse, FormStatus, FormSubmission,
    MAX_OPTION_POINTS, OptionDraft, Question, QuestionDraft, QuestionKind, SubmittedAnswer,
};
pub use gamification::{Achievement, CatalogEntry, UserAchievement, XpGrant};
pub use notification::{
    Announcement, AnnouncementError, NewAnnouncement, NewNotification, Notification,
};
pub use progress::{
    CourseProgress, InteractionType, LessonCompletionRecord, ProgressError, Recalculation,
    completion_percentage,
};
pub use security::{NewSecurityLog, SecurityEvent, SecurityLog};
pub use settings::{PlatformSettings, PlatformSettingsDraft, SettingsError};
pub use user::{
    MIN_PASSWORD_LEN, NewUser, Role, User, UserError, check_password_policy, normalize_email,
};
