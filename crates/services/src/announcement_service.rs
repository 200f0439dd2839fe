use std::sync::Arc;

use nexus_core::model::{Announcement, Audience, NewAnnouncement, NewNotification, User};
use storage::repository::{AnnouncementRepository, UserRepository};
use tracing::info;

use crate::Clock;
use crate::email::{EmailDispatcher, OutgoingEmail};
use crate::error::AnnouncementServiceError;
use crate::notification_service::NotificationService;
use crate::realtime::{Broadcaster, RealtimeEvent, Recipients};

/// Platform-wide posts fanned out as notifications, email, and live events.
#[derive(Clone)]
pub struct AnnouncementService {
    clock: Clock,
    announcements: Arc<dyn AnnouncementRepository>,
    users: Arc<dyn UserRepository>,
    notifications: NotificationService,
    email: EmailDispatcher,
    broadcaster: Broadcaster,
}

impl AnnouncementService {
    #[must_use]
    pub fn new(
        clock: Clock,
        announcements: Arc<dyn AnnouncementRepository>,
        users: Arc<dyn UserRepository>,
        notifications: NotificationService,
        email: EmailDispatcher,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            clock,
            announcements,
            users,
            notifications,
            email,
            broadcaster,
        }
    }

    /// Post an announcement and notify everyone in its audience except the author.
    ///
    /// Email goes out in the background and never fails the post.
    ///
    /// # Errors
    ///
    /// Returns `AnnouncementServiceError::Forbidden` for students.
    pub async fn create(
        &self,
        author: &User,
        title: &str,
        content: &str,
        audience: Audience,
    ) -> Result<Announcement, AnnouncementServiceError> {
        if !author.role.can_author() {
            return Err(AnnouncementServiceError::Forbidden);
        }
        let draft = NewAnnouncement::new(title, content, author.id, audience, self.clock.now())?;
        let announcement = self.announcements.insert_announcement(&draft).await?;

        let recipients: Vec<User> = self
            .users
            .list_users(audience.role())
            .await?
            .into_iter()
            .filter(|user| user.id != author.id)
            .collect();
        info!(
            announcement = %announcement.id,
            audience = audience.as_str(),
            recipients = recipients.len(),
            "announcement posted"
        );

        self.notifications
            .notify(
                recipients
                    .iter()
                    .map(|user| NewNotification {
                        user_id: user.id,
                        title: announcement.title.clone(),
                        description: Some(excerpt(&announcement.content)),
                        link: Some("/announcements".into()),
                    })
                    .collect(),
            )
            .await?;

        self.email
            .dispatch(
                recipients
                    .iter()
                    .map(|user| OutgoingEmail {
                        to: user.email.clone(),
                        subject: announcement.title.clone(),
                        body: announcement.content.clone(),
                    })
                    .collect(),
            )
            .await;

        self.broadcaster.publish(
            Recipients::Users(recipients.iter().map(|user| user.id).collect()),
            RealtimeEvent::Announcement {
                announcement: announcement.clone(),
            },
        );
        Ok(announcement)
    }

    /// Newest first, limited to announcements addressed to the viewer's role.
    ///
    /// # Errors
    ///
    /// Returns `AnnouncementServiceError::Storage` if repository access fails.
    pub async fn list(&self, viewer: &User) -> Result<Vec<Announcement>, AnnouncementServiceError> {
        let announcements = self.announcements.list_announcements().await?;
        Ok(announcements
            .into_iter()
            .filter(|a| a.audience.includes(viewer.role))
            .collect())
    }
}

const EXCERPT_CHARS: usize = 140;

fn excerpt(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_truncates_long_content() {
        assert_eq!(excerpt("short"), "short");
        let long = "x".repeat(EXCERPT_CHARS + 10);
        let cut = excerpt(&long);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 1);
        assert!(cut.ends_with('…'));
    }
}
