use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::calendar::Audience;
use crate::model::ids::{AnnouncementId, NotificationId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnnouncementError {
    #[error("announcement title cannot be empty")]
    EmptyTitle,

    #[error("announcement content cannot be empty")]
    EmptyContent,
}

/// In-app notification shown in a user's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub audience: Audience,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnnouncement {
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub audience: Audience,
    pub created_at: DateTime<Utc>,
}

impl NewAnnouncement {
    /// # Errors
    ///
    /// Returns `AnnouncementError` when the title or content is blank.
    pub fn new(
        title: &str,
        content: &str,
        author_id: UserId,
        audience: Audience,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AnnouncementError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AnnouncementError::EmptyTitle);
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(AnnouncementError::EmptyContent);
        }
        Ok(Self {
            title: title.to_owned(),
            content: content.to_owned(),
            author_id,
            audience,
            created_at,
        })
    }
}
