#![forbid(unsafe_code)]

pub mod announcement_service;
pub mod app_services;
pub mod auth_service;
pub mod calendar_service;
pub mod chat_service;
pub mod course_service;
pub mod email;
pub mod error;
pub mod form_service;
pub mod gamification_service;
pub mod notification_service;
pub mod password;
pub mod progress_service;
pub mod rate_limit;
pub mod realtime;
pub mod settings_service;

pub use nexus_core::Clock;

pub use announcement_service::AnnouncementService;
pub use app_services::{AppServices, ServiceOptions};
pub use auth_service::{AuthRepositories, AuthService, LoginSession};
pub use calendar_service::CalendarService;
pub use chat_service::ChatService;
pub use course_service::{CourseDetail, CourseService};
pub use error::{
    AnnouncementServiceError, AppServicesError, AuthError, CalendarServiceError,
    ChatServiceError, CourseServiceError, EmailError, FormServiceError, GamificationError,
    NotificationError, ProgressServiceError, SettingsServiceError,
};
pub use form_service::FormService;
pub use gamification_service::{GamificationService, GamificationSummary};
pub use notification_service::NotificationService;
pub use progress_service::{LessonOutcome, ProgressService, QuizOutcome};
pub use realtime::{Broadcaster, Envelope, RealtimeEvent, Recipients};
pub use settings_service::SettingsService;
