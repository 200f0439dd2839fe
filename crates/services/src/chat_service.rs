use std::sync::Arc;

use nexus_core::model::{
    ChatMessage, Conversation, ConversationId, UserId, participant_pair, validate_message,
};
use storage::repository::{ChatRepository, UserRepository};
use tracing::debug;

use crate::Clock;
use crate::error::ChatServiceError;
use crate::realtime::{Broadcaster, RealtimeEvent, Recipients};

/// Direct one-to-one messaging.
#[derive(Clone)]
pub struct ChatService {
    clock: Clock,
    chat: Arc<dyn ChatRepository>,
    users: Arc<dyn UserRepository>,
    broadcaster: Broadcaster,
}

impl ChatService {
    #[must_use]
    pub fn new(
        clock: Clock,
        chat: Arc<dyn ChatRepository>,
        users: Arc<dyn UserRepository>,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            clock,
            chat,
            users,
            broadcaster,
        }
    }

    /// Send a message, opening the conversation on first contact.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Chat` for empty or oversized messages and
    /// self-addressed ones, `ChatServiceError::RecipientNotFound` for unknown users.
    pub async fn send_message(
        &self,
        sender: UserId,
        recipient: UserId,
        content: &str,
    ) -> Result<ChatMessage, ChatServiceError> {
        let content = validate_message(content)?;
        let pair = participant_pair(sender, recipient)?;
        if self.users.get_user(recipient).await?.is_none() {
            return Err(ChatServiceError::RecipientNotFound);
        }

        let now = self.clock.now();
        let conversation = self.chat.find_or_create_conversation(pair, now).await?;
        let message = self
            .chat
            .insert_message(conversation.id, sender, &content, now)
            .await?;
        debug!(conversation = %conversation.id, message = %message.id, "chat message sent");

        self.broadcaster.publish(
            Recipients::Users(pair.to_vec()),
            RealtimeEvent::ChatMessage {
                message: message.clone(),
            },
        );
        Ok(message)
    }

    /// Most recently active first.
    ///
    /// # Errors
    ///
    /// Returns `ChatServiceError::Storage` if repository access fails.
    pub async fn list_conversations(
        &self,
        user: UserId,
    ) -> Result<Vec<Conversation>, ChatServiceError> {
        Ok(self.chat.list_conversations(user).await?)
    }

    /// # Errors
    ///
    /// Returns `ChatServiceError::Forbidden` unless `user` is a participant.
    pub async fn list_messages(
        &self,
        user: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<ChatMessage>, ChatServiceError> {
        let conversation = self
            .chat
            .get_conversation(conversation_id)
            .await?
            .ok_or(ChatServiceError::NotFound)?;
        if !conversation.includes(user) {
            return Err(ChatServiceError::Forbidden);
        }
        Ok(self.chat.list_messages(conversation.id).await?)
    }
}
