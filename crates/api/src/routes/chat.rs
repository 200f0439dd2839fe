use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use nexus_core::model::{ChatMessage, Conversation, ConversationId, UserId};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: UserId,
    pub content: String,
}

pub async fn conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    Ok(Json(state.services.chat().list_conversations(user.id).await?))
}

pub async fn messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    Ok(Json(state.services.chat().list_messages(user.id, id).await?))
}

pub async fn send(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let message = state
        .services
        .chat()
        .send_message(user.id, body.recipient_id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
