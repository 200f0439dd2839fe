use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use nexus_core::model::{Form, FormDraft, FormId, FormResponse, FormSubmission};

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Form>>, ApiError> {
    Ok(Json(state.services.forms().list_forms(&user).await?))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(draft): Json<FormDraft>,
) -> Result<(StatusCode, Json<Form>), ApiError> {
    let form = state.services.forms().create_form(&user, draft).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<FormId>,
) -> Result<Json<Form>, ApiError> {
    Ok(Json(state.services.forms().get_form(&user, id).await?))
}

pub async fn publish(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<FormId>,
) -> Result<Json<Form>, ApiError> {
    Ok(Json(state.services.forms().publish_form(&user, id).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<FormId>,
) -> Result<StatusCode, ApiError> {
    state.services.forms().delete_form(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<FormId>,
    Json(submission): Json<FormSubmission>,
) -> Result<(StatusCode, Json<FormResponse>), ApiError> {
    let response = state
        .services
        .forms()
        .submit_response(&user, id, submission)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn responses(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<FormId>,
) -> Result<Json<Vec<FormResponse>>, ApiError> {
    Ok(Json(state.services.forms().list_responses(&user, id).await?))
}
