use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::model::{
    Announcement, AnnouncementId, Audience, NewAnnouncement, NewNotification, Notification,
    NotificationId, UserId,
};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{bind_id, bool_col, db, id_col, opt_text_col, ser, text_col, time_col};
use crate::repository::{AnnouncementRepository, NotificationRepository, StorageError};

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, description, link, read, created_at";

fn notification_from_row(row: &SqliteRow) -> Result<Notification, StorageError> {
    Ok(Notification {
        id: id_col(row, "id", NotificationId::new)?,
        user_id: id_col(row, "user_id", UserId::new)?,
        title: text_col(row, "title")?,
        description: opt_text_col(row, "description")?,
        link: opt_text_col(row, "link")?,
        read: bool_col(row, "read")?,
        created_at: time_col(row, "created_at")?,
    })
}

fn announcement_from_row(row: &SqliteRow) -> Result<Announcement, StorageError> {
    Ok(Announcement {
        id: id_col(row, "id", AnnouncementId::new)?,
        title: text_col(row, "title")?,
        content: text_col(row, "content")?,
        author_id: id_col(row, "author_id", UserId::new)?,
        audience: Audience::parse(&text_col(row, "audience")?).map_err(ser)?,
        created_at: time_col(row, "created_at")?,
    })
}

#[async_trait]
impl NotificationRepository for SqliteRepository {
    async fn insert_notifications(
        &self,
        notifications: &[NewNotification],
        created_at: DateTime<Utc>,
    ) -> Result<Vec<Notification>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut created = Vec::with_capacity(notifications.len());
        for draft in notifications {
            let row = sqlx::query(&format!(
                r"
                INSERT INTO notifications (user_id, title, description, link, read, created_at)
                VALUES (?1, ?2, ?3, ?4, 0, ?5)
                RETURNING {NOTIFICATION_COLUMNS}
                "
            ))
            .bind(bind_id("user_id", draft.user_id.value())?)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(&draft.link)
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(db)?;
            created.push(notification_from_row(&row)?);
        }
        tx.commit().await.map_err(db)?;
        Ok(created)
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Notification>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(bind_id("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(notification_from_row).collect()
    }

    async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2")
            .bind(bind_id("notification_id", id.value())?)
            .bind(bind_id("user_id", user_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StorageError> {
        let res = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0")
            .bind(bind_id("user_id", user_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(res.rows_affected())
    }
}

#[async_trait]
impl AnnouncementRepository for SqliteRepository {
    async fn insert_announcement(
        &self,
        announcement: &NewAnnouncement,
    ) -> Result<Announcement, StorageError> {
        let row = sqlx::query(
            r"
            INSERT INTO announcements (title, content, author_id, audience, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id, title, content, author_id, audience, created_at
            ",
        )
        .bind(&announcement.title)
        .bind(&announcement.content)
        .bind(bind_id("author_id", announcement.author_id.value())?)
        .bind(announcement.audience.as_str())
        .bind(announcement.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        announcement_from_row(&row)
    }

    async fn list_announcements(&self) -> Result<Vec<Announcement>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, content, author_id, audience, created_at
            FROM announcements
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(announcement_from_row).collect()
    }
}
