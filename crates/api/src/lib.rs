//! HTTP surface: JSON handlers over `services`, cookie sessions and an SSE feed.

#![forbid(unsafe_code)]

use axum::Router;
use axum::routing::{delete, get, patch, post};
use services::AppServices;
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;
pub mod session;

pub use error::ApiError;
pub use session::{CurrentUser, SESSION_COOKIE};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        Self { services }
    }
}

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    use routes::{admin, auth, chat, courses, engagement, events, forms, progress, realtime};

    let accounts = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/me", get(auth::me))
        .route("/api/users", post(auth::create_user))
        .route("/api/users/:id/role", patch(auth::change_role));

    let learning = Router::new()
        .route("/api/courses", get(courses::list).post(courses::create))
        .route("/api/courses/:id", get(courses::get))
        .route("/api/courses/:id/lessons", post(courses::add_lesson))
        .route("/api/courses/:id/publish", post(courses::publish))
        .route(
            "/api/courses/:id/enroll",
            post(courses::enroll).delete(courses::unenroll),
        )
        .route("/api/progress", get(progress::list))
        .route("/api/progress/:course_id", get(progress::get))
        .route(
            "/api/progress/:course_id/lessons/:lesson_id/complete",
            post(progress::complete_lesson),
        )
        .route(
            "/api/progress/:course_id/lessons/:lesson_id/quiz",
            post(progress::submit_quiz),
        )
        .route("/api/forms", get(forms::list).post(forms::create))
        .route("/api/forms/:id", get(forms::get).delete(forms::delete))
        .route("/api/forms/:id/publish", post(forms::publish))
        .route(
            "/api/forms/:id/responses",
            get(forms::responses).post(forms::submit),
        );

    let community = Router::new()
        .route("/api/events", get(events::list).post(events::create))
        .route("/api/events/:id", delete(events::delete).put(events::update))
        .route("/api/gamification/me", get(engagement::my_gamification))
        .route("/api/achievements", get(engagement::achievements))
        .route("/api/notifications", get(engagement::notifications))
        .route("/api/notifications/read-all", post(engagement::mark_all_read))
        .route("/api/notifications/:id/read", post(engagement::mark_read))
        .route(
            "/api/announcements",
            get(engagement::announcements).post(engagement::post_announcement),
        )
        .route("/api/chat/conversations", get(chat::conversations))
        .route("/api/chat/conversations/:id/messages", get(chat::messages))
        .route("/api/chat/messages", post(chat::send))
        .route("/api/realtime", get(realtime::stream));

    let administration = Router::new()
        .route("/api/settings", get(admin::settings).put(admin::save_settings))
        .route("/api/security-logs", get(admin::security_logs));

    Router::new()
        .route("/health", get(routes::health))
        .merge(accounts)
        .merge(learning)
        .merge(community)
        .merge(administration)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
