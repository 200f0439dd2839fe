use axum::Json;
use axum::extract::{Path, State};
use nexus_core::model::{CourseId, CourseProgress, FormSubmission, LessonId};
use services::{LessonOutcome, QuizOutcome};

use crate::AppState;
use crate::error::ApiError;
use crate::session::CurrentUser;

pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<CourseProgress>>, ApiError> {
    Ok(Json(state.services.progress().list_progress(user.id).await?))
}

pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(course_id): Path<CourseId>,
) -> Result<Json<CourseProgress>, ApiError> {
    Ok(Json(
        state
            .services
            .progress()
            .get_progress(user.id, course_id)
            .await?,
    ))
}

/// Marks a lesson viewed.
pub async fn complete_lesson(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((course_id, lesson_id)): Path<(CourseId, LessonId)>,
) -> Result<Json<LessonOutcome>, ApiError> {
    let outcome = state
        .services
        .progress()
        .complete_lesson(user.id, course_id, lesson_id)
        .await?;
    Ok(Json(outcome))
}

/// Scores the lesson's quiz and records the lesson with the percent score.
pub async fn submit_quiz(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((course_id, lesson_id)): Path<(CourseId, LessonId)>,
    Json(submission): Json<FormSubmission>,
) -> Result<Json<QuizOutcome>, ApiError> {
    let outcome = state
        .services
        .progress()
        .submit_lesson_quiz(&user, course_id, lesson_id, submission)
        .await?;
    Ok(Json(outcome))
}
