use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use nexus_core::model::{Course, CourseId, CourseProgress, FormId, Lesson};
use serde::Deserialize;
use services::CourseDetail;

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

#[derive(Debug, Deserialize)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddLessonRequest {
    pub title: String,
    pub quiz_form_id: Option<FormId>,
}

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.services.courses().list_courses(&user).await?))
}

pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<CreateCourseRequest>,
) -> Result<(StatusCode, Json<Course>), ApiError> {
    let course = state
        .services
        .courses()
        .create_course(&user, &body.title, body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<CourseId>,
) -> Result<Json<CourseDetail>, ApiError> {
    Ok(Json(state.services.courses().get_course(&user, id).await?))
}

pub async fn add_lesson(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<CourseId>,
    Json(body): Json<AddLessonRequest>,
) -> Result<(StatusCode, Json<Lesson>), ApiError> {
    let lesson = state
        .services
        .courses()
        .add_lesson(&user, id, &body.title, body.quiz_form_id)
        .await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn publish(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<CourseId>,
) -> Result<Json<Course>, ApiError> {
    Ok(Json(state.services.courses().publish(&user, id).await?))
}

pub async fn enroll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<CourseId>,
) -> Result<(StatusCode, Json<CourseProgress>), ApiError> {
    let progress = state.services.progress().enroll(user.id, id).await?;
    Ok((StatusCode::CREATED, Json(progress)))
}

pub async fn unenroll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<CourseId>,
) -> Result<StatusCode, ApiError> {
    state.services.progress().unenroll(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
