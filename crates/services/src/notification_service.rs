use std::sync::Arc;

use nexus_core::model::{NewNotification, Notification, NotificationId, UserId};
use storage::repository::{NotificationRepository, StorageError};

use crate::Clock;
use crate::error::NotificationError;
use crate::realtime::{Broadcaster, RealtimeEvent, Recipients};

/// Per-user inbox, pushed live to connected clients.
#[derive(Clone)]
pub struct NotificationService {
    clock: Clock,
    notifications: Arc<dyn NotificationRepository>,
    broadcaster: Broadcaster,
}

impl NotificationService {
    #[must_use]
    pub fn new(
        clock: Clock,
        notifications: Arc<dyn NotificationRepository>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            clock,
            notifications,
            broadcaster,
        }
    }

    /// Persist notifications and push each one to its recipient.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Storage` if persistence fails.
    pub async fn notify(
        &self,
        drafts: Vec<NewNotification>,
    ) -> Result<Vec<Notification>, NotificationError> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let created = self
            .notifications
            .insert_notifications(&drafts, self.clock.now())
            .await?;
        for notification in &created {
            self.broadcaster.publish(
                Recipients::Users(vec![notification.user_id]),
                RealtimeEvent::Notification {
                    notification: notification.clone(),
                },
            );
        }
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `NotificationError::Storage` if repository access fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.notifications.list_notifications(user_id).await?)
    }

    /// # Errors
    ///
    /// Returns `NotificationError::NotFound` unless the notification belongs to the user.
    pub async fn mark_read(
        &self,
        user_id: UserId,
        id: NotificationId,
    ) -> Result<(), NotificationError> {
        match self.notifications.mark_read(user_id, id).await {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound) => Err(NotificationError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns how many notifications were unread.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Storage` if repository access fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64, NotificationError> {
        Ok(self.notifications.mark_all_read(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::time::fixed_clock;
    use storage::InMemoryRepository;

    fn draft(user: u64, title: &str) -> NewNotification {
        NewNotification {
            user_id: UserId::new(user),
            title: title.into(),
            description: None,
            link: None,
        }
    }

    #[tokio::test]
    async fn notifications_are_private_to_their_owner() {
        let broadcaster = Broadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let service = NotificationService::new(
            fixed_clock(),
            Arc::new(InMemoryRepository::new()),
            broadcaster,
        );

        let created = service
            .notify(vec![draft(1, "Welcome"), draft(2, "Hi")])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);
        assert!(rx.recv().await.unwrap().is_for(UserId::new(1)));

        assert!(matches!(
            service.mark_read(UserId::new(2), created[0].id).await,
            Err(NotificationError::NotFound)
        ));
        service.mark_read(UserId::new(1), created[0].id).await.unwrap();
        assert!(service.list(UserId::new(1)).await.unwrap()[0].read);
        assert_eq!(service.mark_all_read(UserId::new(2)).await.unwrap(), 1);
    }
}
