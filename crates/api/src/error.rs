//! One error type for every handler, mapped onto HTTP status codes.

use std::fmt::Display;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nexus_core::model::CourseError;
use serde_json::json;
use services::{
    AnnouncementServiceError, AuthError, CalendarServiceError, ChatServiceError,
    CourseServiceError, FormServiceError, GamificationError, NotificationError,
    ProgressServiceError, SettingsServiceError,
};
use storage::repository::StorageError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    TooManyRequests(String),
    /// Detail is logged, never sent to the client.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        ApiError::Unauthorized("authentication required".into())
    }

    pub fn internal(err: impl Display) -> Self {
        ApiError::Internal(err.to_string())
    }

    fn bad_request(err: impl Display) -> Self {
        ApiError::BadRequest(err.to_string())
    }

    fn forbidden(err: impl Display) -> Self {
        ApiError::Forbidden(err.to_string())
    }

    fn not_found(err: impl Display) -> Self {
        ApiError::NotFound(err.to_string())
    }

    fn conflict(err: impl Display) -> Self {
        ApiError::Conflict(err.to_string())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                error!(%detail, "request failed");
                "internal server error".to_owned()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::not_found(err),
            StorageError::Conflict => ApiError::conflict(err),
            other => ApiError::internal(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AuthError::RateLimited => ApiError::TooManyRequests(err.to_string()),
            AuthError::Forbidden | AuthError::RegistrationClosed => ApiError::forbidden(err),
            AuthError::EmailTaken => ApiError::conflict(err),
            AuthError::User(_) => ApiError::bad_request(err),
            AuthError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::Forbidden => ApiError::forbidden(err),
            CourseServiceError::NotFound => ApiError::not_found(err),
            CourseServiceError::Course(CourseError::AlreadyPublished) => ApiError::conflict(err),
            CourseServiceError::InvalidQuizForm | CourseServiceError::Course(_) => {
                ApiError::bad_request(err)
            }
            CourseServiceError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<FormServiceError> for ApiError {
    fn from(err: FormServiceError) -> Self {
        match err {
            FormServiceError::Forbidden => ApiError::forbidden(err),
            FormServiceError::NotFound => ApiError::not_found(err),
            FormServiceError::Form(_) => ApiError::bad_request(err),
            FormServiceError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::CourseNotFound
            | ProgressServiceError::LessonNotFound
            | ProgressServiceError::NotEnrolled => ApiError::not_found(err),
            ProgressServiceError::AlreadyEnrolled => ApiError::conflict(err),
            ProgressServiceError::CourseNotPublished
            | ProgressServiceError::LessonNotInCourse
            | ProgressServiceError::NoQuiz
            | ProgressServiceError::Progress(_) => ApiError::bad_request(err),
            ProgressServiceError::Form(inner) => inner.into(),
            ProgressServiceError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<CalendarServiceError> for ApiError {
    fn from(err: CalendarServiceError) -> Self {
        match err {
            CalendarServiceError::Forbidden => ApiError::forbidden(err),
            CalendarServiceError::NotFound => ApiError::not_found(err),
            CalendarServiceError::Calendar(_) => ApiError::bad_request(err),
            CalendarServiceError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => ApiError::not_found(err),
            NotificationError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<GamificationError> for ApiError {
    fn from(err: GamificationError) -> Self {
        match err {
            GamificationError::Notification(inner) => inner.into(),
            GamificationError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<AnnouncementServiceError> for ApiError {
    fn from(err: AnnouncementServiceError) -> Self {
        match err {
            AnnouncementServiceError::Forbidden => ApiError::forbidden(err),
            AnnouncementServiceError::Announcement(_) => ApiError::bad_request(err),
            AnnouncementServiceError::Notification(inner) => inner.into(),
            AnnouncementServiceError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<ChatServiceError> for ApiError {
    fn from(err: ChatServiceError) -> Self {
        match err {
            ChatServiceError::Forbidden => ApiError::forbidden(err),
            ChatServiceError::NotFound | ChatServiceError::RecipientNotFound => {
                ApiError::not_found(err)
            }
            ChatServiceError::Chat(_) => ApiError::bad_request(err),
            ChatServiceError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

impl From<SettingsServiceError> for ApiError {
    fn from(err: SettingsServiceError) -> Self {
        match err {
            SettingsServiceError::Forbidden => ApiError::forbidden(err),
            SettingsServiceError::Settings(_) => ApiError::bad_request(err),
            SettingsServiceError::Storage(inner) => inner.into(),
            other => ApiError::internal(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_keep_their_meaning() {
        assert_eq!(
            ApiError::from(StorageError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::Conflict).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StorageError::Connection("pool closed".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn nested_service_errors_unwrap_to_the_inner_status() {
        let err = ProgressServiceError::Form(FormServiceError::Forbidden);
        assert_eq!(ApiError::from(err).status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(AuthError::RateLimited).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
