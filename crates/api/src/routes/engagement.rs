//! XP, achievements, notifications and announcements.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use nexus_core::model::{Achievement, Announcement, Audience, Notification, NotificationId};
use serde::{Deserialize, Serialize};
use services::GamificationSummary;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub audience: Audience,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

pub async fn my_gamification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<GamificationSummary>, ApiError> {
    Ok(Json(state.services.gamification().summary(user.id).await?))
}

pub async fn achievements(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<Vec<Achievement>>, ApiError> {
    Ok(Json(state.services.gamification().catalog().await?))
}

pub async fn notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.services.notifications().list(user.id).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode, ApiError> {
    state.services.notifications().mark_read(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MarkedRead>, ApiError> {
    let updated = state.services.notifications().mark_all_read(user.id).await?;
    Ok(Json(MarkedRead { updated }))
}

pub async fn announcements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Announcement>>, ApiError> {
    Ok(Json(state.services.announcements().list(&user).await?))
}

pub async fn post_announcement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<AnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), ApiError> {
    let announcement = state
        .services
        .announcements()
        .create(&user, &body.title, &body.content, body.audience)
        .await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}
