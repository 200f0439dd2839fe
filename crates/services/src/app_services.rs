use std::sync::Arc;

use chrono::Duration;
use reqwest::Client;
use storage::repository::Storage;

use crate::Clock;
use crate::announcement_service::AnnouncementService;
use crate::auth_service::{AuthRepositories, AuthService, DEFAULT_SESSION_TTL_HOURS};
use crate::calendar_service::CalendarService;
use crate::chat_service::ChatService;
use crate::course_service::CourseService;
use crate::email::{EmailDispatcher, LogMailer, MailTransport};
use crate::error::AppServicesError;
use crate::form_service::FormService;
use crate::gamification_service::GamificationService;
use crate::notification_service::NotificationService;
use crate::progress_service::ProgressService;
use crate::realtime::Broadcaster;
use crate::settings_service::SettingsService;

/// Knobs that vary between the server, tests, and the seeder.
#[derive(Clone)]
pub struct ServiceOptions {
    pub session_ttl: Duration,
    pub mail: MailTransport,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            mail: MailTransport::Fixed(Arc::new(LogMailer)),
        }
    }
}

impl ServiceOptions {
    /// Send through the provider configured in platform settings.
    #[must_use]
    pub fn with_provider_mail(mut self) -> Self {
        self.mail = MailTransport::Provider(Client::new());
        self
    }
}

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    auth: Arc<AuthService>,
    courses: Arc<CourseService>,
    forms: Arc<FormService>,
    progress: Arc<ProgressService>,
    calendar: Arc<CalendarService>,
    gamification: Arc<GamificationService>,
    notifications: Arc<NotificationService>,
    announcements: Arc<AnnouncementService>,
    chat: Arc<ChatService>,
    settings: Arc<SettingsService>,
    broadcaster: Broadcaster,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        options: ServiceOptions,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, options))
    }

    /// Build services over process-local storage.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), clock, ServiceOptions::default())
    }

    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, options: ServiceOptions) -> Self {
        let broadcaster = Broadcaster::default();

        let notifications = NotificationService::new(
            clock.clone(),
            Arc::clone(&storage.notifications),
            broadcaster.clone(),
        );
        let gamification = GamificationService::new(
            clock.clone(),
            Arc::clone(&storage.users),
            Arc::clone(&storage.gamification),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.courses),
            notifications.clone(),
        );
        let forms = FormService::new(clock.clone(), Arc::clone(&storage.forms));
        let courses = CourseService::new(
            clock.clone(),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.forms),
            gamification.clone(),
        );
        let progress = ProgressService::new(
            clock.clone(),
            Arc::clone(&storage.courses),
            Arc::clone(&storage.progress),
            forms.clone(),
            gamification.clone(),
        );
        let calendar = CalendarService::new(Arc::clone(&storage.calendar), broadcaster.clone());
        let email = EmailDispatcher::new(Arc::clone(&storage.settings), options.mail);
        let announcements = AnnouncementService::new(
            clock.clone(),
            Arc::clone(&storage.announcements),
            Arc::clone(&storage.users),
            notifications.clone(),
            email,
            broadcaster.clone(),
        );
        let chat = ChatService::new(
            clock.clone(),
            Arc::clone(&storage.chat),
            Arc::clone(&storage.users),
            broadcaster.clone(),
        );
        let auth = AuthService::new(
            clock,
            AuthRepositories {
                users: Arc::clone(&storage.users),
                sessions: Arc::clone(&storage.sessions),
                security_logs: Arc::clone(&storage.security_logs),
                settings: Arc::clone(&storage.settings),
            },
            options.session_ttl,
        );
        let settings = SettingsService::new(Arc::clone(&storage.settings));

        Self {
            auth: Arc::new(auth),
            courses: Arc::new(courses),
            forms: Arc::new(forms),
            progress: Arc::new(progress),
            calendar: Arc::new(calendar),
            gamification: Arc::new(gamification),
            notifications: Arc::new(notifications),
            announcements: Arc::new(announcements),
            chat: Arc::new(chat),
            settings: Arc::new(settings),
            broadcaster,
        }
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn courses(&self) -> Arc<CourseService> {
        Arc::clone(&self.courses)
    }

    #[must_use]
    pub fn forms(&self) -> Arc<FormService> {
        Arc::clone(&self.forms)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn calendar(&self) -> Arc<CalendarService> {
        Arc::clone(&self.calendar)
    }

    #[must_use]
    pub fn gamification(&self) -> Arc<GamificationService> {
        Arc::clone(&self.gamification)
    }

    #[must_use]
    pub fn notifications(&self) -> Arc<NotificationService> {
        Arc::clone(&self.notifications)
    }

    #[must_use]
    pub fn announcements(&self) -> Arc<AnnouncementService> {
        Arc::clone(&self.announcements)
    }

    #[must_use]
    pub fn chat(&self) -> Arc<ChatService> {
        Arc::clone(&self.chat)
    }

    #[must_use]
    pub fn settings(&self) -> Arc<SettingsService> {
        Arc::clone(&self.settings)
    }

    #[must_use]
    pub fn broadcaster(&self) -> Broadcaster {
        self.broadcaster.clone()
    }
}
