//! Server-sent events for chat, notifications, announcements and calendar changes.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::AppState;
use crate::session::CurrentUser;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// GET /api/realtime
pub async fn stream(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(user_id = %user.id, "realtime client connected");
    let user_id = user.id;
    let rx = state.services.broadcaster().subscribe();

    let events = BroadcastStream::new(rx).filter_map(move |item| async move {
        match item {
            Ok(envelope) if envelope.is_for(user_id) => {
                match serde_json::to_string(&envelope.event) {
                    Ok(json) => Some(Ok(Event::default().event(envelope.event.name()).data(json))),
                    Err(err) => {
                        warn!(error = %err, "failed to serialize realtime event");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(err) => {
                warn!(%user_id, error = %err, "realtime subscriber lagged");
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("keep-alive"))
}
