use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use nexus_core::model::{NewUser, Role, User, UserId};
use serde::Deserialize;
use tower_cookies::Cookies;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;
use crate::session::{ClientIp, CurrentUser, removal_cookie, session_cookie, session_token};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    ClientIp(ip): ClientIp,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>, ApiError> {
    let login = state
        .services
        .auth()
        .login(&body.email, &body.password, ip)
        .await?;
    cookies.add(session_cookie(&login));
    Ok(Json(login.user))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = session_token(&cookies) {
        state.services.auth().logout(&token).await?;
    }
    cookies.remove(removal_cookie());
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .services
        .auth()
        .register(&body.email, &body.name, &body.password)
        .await?;
    info!(user_id = %user.id, "self-registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let draft = NewUser {
        email: body.email,
        name: body.name,
        role: body.role,
    };
    let user = state
        .services
        .auth()
        .create_user(&current.0, draft, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// PATCH /api/users/:id/role
pub async fn change_role(
    State(state): State<AppState>,
    current: CurrentUser,
    ClientIp(ip): ClientIp,
    Path(user_id): Path<UserId>,
    Json(body): Json<RoleRequest>,
) -> Result<Json<User>, ApiError> {
    let user = state
        .services
        .auth()
        .change_role(&current.0, user_id, body.role, ip)
        .await?;
    Ok(Json(user))
}
