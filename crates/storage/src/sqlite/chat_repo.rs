use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nexus_core::model::{ChatMessage, Conversation, ConversationId, MessageId, UserId};
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{bind_id, db, id_col, text_col, time_col};
use crate::repository::{ChatRepository, StorageError};

const CONVERSATION_COLUMNS: &str = "id, participant_a, participant_b, created_at, updated_at";

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation, StorageError> {
    Ok(Conversation {
        id: id_col(row, "id", ConversationId::new)?,
        participants: [
            id_col(row, "participant_a", UserId::new)?,
            id_col(row, "participant_b", UserId::new)?,
        ],
        created_at: time_col(row, "created_at")?,
        updated_at: time_col(row, "updated_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<ChatMessage, StorageError> {
    Ok(ChatMessage {
        id: id_col(row, "id", MessageId::new)?,
        conversation_id: id_col(row, "conversation_id", ConversationId::new)?,
        sender_id: id_col(row, "sender_id", UserId::new)?,
        content: text_col(row, "content")?,
        created_at: time_col(row, "created_at")?,
    })
}

#[async_trait]
impl ChatRepository for SqliteRepository {
    async fn find_or_create_conversation(
        &self,
        participants: [UserId; 2],
        at: DateTime<Utc>,
    ) -> Result<Conversation, StorageError> {
        let [a, b] = participants;
        let a = bind_id("participant_a", a.value())?;
        let b = bind_id("participant_b", b.value())?;

        sqlx::query(
            r"
            INSERT INTO conversations (participant_a, participant_b, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ON CONFLICT(participant_a, participant_b) DO NOTHING
            ",
        )
        .bind(a)
        .bind(b)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db)?;

        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE participant_a = ?1 AND participant_b = ?2"
        ))
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await
        .map_err(db)?;
        conversation_from_row(&row)
    }

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<Option<Conversation>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
        ))
        .bind(bind_id("conversation_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn list_conversations(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Conversation>, StorageError> {
        let rows = sqlx::query(&format!(
            r"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE participant_a = ?1 OR participant_b = ?1
            ORDER BY updated_at DESC, id DESC
            "
        ))
        .bind(bind_id("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(conversation_from_row).collect()
    }

    async fn insert_message(
        &self,
        conversation_id: ConversationId,
        sender_id: UserId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<ChatMessage, StorageError> {
        let conversation = bind_id("conversation_id", conversation_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db)?;

        let bumped = sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
            .bind(at)
            .bind(conversation)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
        if bumped.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        let row = sqlx::query(
            r"
            INSERT INTO chat_messages (conversation_id, sender_id, content, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id, conversation_id, sender_id, content, created_at
            ",
        )
        .bind(conversation)
        .bind(bind_id("sender_id", sender_id.value())?)
        .bind(content)
        .bind(at)
        .fetch_one(&mut *tx)
        .await
        .map_err(db)?;
        let message = message_from_row(&row)?;

        tx.commit().await.map_err(db)?;
        Ok(message)
    }

    async fn list_messages(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, conversation_id, sender_id, content, created_at
            FROM chat_messages
            WHERE conversation_id = ?1
            ORDER BY created_at ASC, id ASC
            ",
        )
        .bind(bind_id("conversation_id", conversation_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        rows.iter().map(message_from_row).collect()
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<ChatMessage>, StorageError> {
        let row = sqlx::query(
            "SELECT id, conversation_id, sender_id, content, created_at FROM chat_messages WHERE id = ?1",
        )
        .bind(bind_id("message_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?;
        row.as_ref().map(message_from_row).transpose()
    }
}
