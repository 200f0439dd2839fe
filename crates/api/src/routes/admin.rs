use axum::Json;
use axum::extract::{Query, State};
use nexus_core::model::{PlatformSettings, PlatformSettingsDraft, SecurityLog};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub limit: Option<u32>,
}

pub async fn settings(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<PlatformSettings>, ApiError> {
    current.require_admin()?;
    Ok(Json(state.services.settings().load().await?))
}

pub async fn save_settings(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(draft): Json<PlatformSettingsDraft>,
) -> Result<Json<PlatformSettings>, ApiError> {
    let admin = current.require_admin()?;
    Ok(Json(state.services.settings().save(admin, draft).await?))
}

pub async fn security_logs(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<SecurityLog>>, ApiError> {
    let admin = current.require_admin()?;
    Ok(Json(
        state
            .services
            .auth()
            .security_logs(admin, query.limit)
            .await?,
    ))
}
