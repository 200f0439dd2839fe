//! In-process fan-out of live updates to connected clients.

use std::sync::Arc;

use nexus_core::model::{Announcement, ChatMessage, EventId, Notification, UserId};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RealtimeEvent {
    ChatMessage { message: ChatMessage },
    Notification { notification: Notification },
    Announcement { announcement: Announcement },
    CalendarChanged { event_id: EventId },
}

impl RealtimeEvent {
    /// SSE event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::ChatMessage { .. } => "chat_message",
            RealtimeEvent::Notification { .. } => "notification",
            RealtimeEvent::Announcement { .. } => "announcement",
            RealtimeEvent::CalendarChanged { .. } => "calendar_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    Everyone,
    Users(Vec<UserId>),
}

/// An event together with who may receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub recipients: Recipients,
    pub event: RealtimeEvent,
}

impl Envelope {
    #[must_use]
    pub fn is_for(&self, user: UserId) -> bool {
        match &self.recipients {
            Recipients::Everyone => true,
            Recipients::Users(users) => users.contains(&user),
        }
    }
}

/// Thin wrapper over a broadcast channel; slow subscribers lose events.
#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<Arc<Envelope>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Broadcaster {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, recipients: Recipients, event: RealtimeEvent) {
        let name = event.name();
        match self.tx.send(Arc::new(Envelope { recipients, event })) {
            Ok(receivers) => debug!(event = name, receivers, "realtime event published"),
            Err(_) => debug!(event = name, "realtime event dropped, no subscribers"),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_addressed_events() {
        let broadcaster = Broadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(
            Recipients::Users(vec![UserId::new(7)]),
            RealtimeEvent::CalendarChanged {
                event_id: EventId::new(1),
            },
        );

        let envelope = rx.recv().await.unwrap();
        assert!(envelope.is_for(UserId::new(7)));
        assert!(!envelope.is_for(UserId::new(8)));
        assert_eq!(envelope.event.name(), "calendar_changed");
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let broadcaster = Broadcaster::default();
        broadcaster.publish(
            Recipients::Everyone,
            RealtimeEvent::CalendarChanged {
                event_id: EventId::new(1),
            },
        );
    }
}
