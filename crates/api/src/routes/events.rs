use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use nexus_core::model::{CalendarEvent, EventDraft, EventId, Occurrence};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

/// Query window; both bounds are inclusive RFC 3339 instants.
#[derive(Debug, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(window): Query<Window>,
) -> Result<Json<Vec<Occurrence>>, ApiError> {
    let occurrences = state
        .services
        .calendar()
        .list_occurrences(&user, window.start, window.end)
        .await?;
    Ok(Json(occurrences))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(draft): Json<EventDraft>,
) -> Result<(StatusCode, Json<CalendarEvent>), ApiError> {
    let event = state.services.calendar().create_event(&user, draft).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<EventId>,
    Json(draft): Json<EventDraft>,
) -> Result<Json<CalendarEvent>, ApiError> {
    Ok(Json(
        state
            .services
            .calendar()
            .update_event(&user, id, draft)
            .await?,
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<EventId>,
) -> Result<StatusCode, ApiError> {
    state.services.calendar().delete_event(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
