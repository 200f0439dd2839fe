use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{ConversationId, MessageId, UserId};

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_LEN: usize = 4_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message exceeds {MAX_MESSAGE_LEN} characters")]
    MessageTooLong,

    #[error("cannot start a conversation with yourself")]
    SelfConversation,
}

/// Direct conversation between two users. `participants` is sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: [UserId; 2],
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    #[must_use]
    pub fn includes(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// The participant that is not `user`.
    #[must_use]
    pub fn other(&self, user: UserId) -> Option<UserId> {
        match self.participants {
            [a, b] if a == user => Some(b),
            [a, b] if b == user => Some(a),
            _ => None,
        }
    }
}

/// Canonical participant pair, so (a, b) and (b, a) share one conversation.
///
/// # Errors
///
/// Returns `ChatError::SelfConversation` when both ids are equal.
pub fn participant_pair(a: UserId, b: UserId) -> Result<[UserId; 2], ChatError> {
    if a == b {
        return Err(ChatError::SelfConversation);
    }
    Ok(if a < b { [a, b] } else { [b, a] })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Trims and bounds message content.
///
/// # Errors
///
/// Returns `ChatError` for blank or oversized content.
pub fn validate_message(content: &str) -> Result<String, ChatError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ChatError::EmptyMessage);
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(ChatError::MessageTooLong);
    }
    Ok(content.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_is_order_independent() {
        let a = UserId::new(3);
        let b = UserId::new(1);
        assert_eq!(participant_pair(a, b).unwrap(), participant_pair(b, a).unwrap());
        assert_eq!(participant_pair(a, a).unwrap_err(), ChatError::SelfConversation);
    }

    #[test]
    fn message_validation() {
        assert_eq!(validate_message("  hi ").unwrap(), "hi");
        assert_eq!(validate_message("   ").unwrap_err(), ChatError::EmptyMessage);
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(validate_message(&long).unwrap_err(), ChatError::MessageTooLong);
    }
}
