//! Cookie-backed sessions and request-scoped identity.

use std::net::SocketAddr;

use axum::RequestPartsExt;
use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use nexus_core::model::User;
use services::LoginSession;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "session";

/// The signed-in user, resolved from the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// # Errors
    ///
    /// Returns `ApiError::Forbidden` unless the user is an administrator.
    pub fn require_admin(&self) -> Result<&User, ApiError> {
        if self.0.role.is_admin() {
            Ok(&self.0)
        } else {
            Err(ApiError::Forbidden("administrator role required".into()))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let cookies = parts
            .extract::<Cookies>()
            .await
            .map_err(|(_, msg)| ApiError::internal(msg))?;
        let token = cookies
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_owned())
            .ok_or_else(ApiError::unauthenticated)?;

        match state.services.auth().authenticate(&token).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                cookies.remove(removal_cookie());
                Err(ApiError::unauthenticated())
            }
        }
    }
}

/// Best-effort client address for the security log.
#[derive(Debug, Clone, Default)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|ip| ip.trim().to_owned())
            .filter(|ip| !ip.is_empty());
        if forwarded.is_some() {
            return Ok(ClientIp(forwarded));
        }
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(ClientIp(peer))
    }
}

pub fn session_cookie(login: &LoginSession) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, login.session.token.clone());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie
}

/// Token of the current request, if any, for logout.
pub fn session_token(cookies: &Cookies) -> Option<String> {
    let token = cookies.get(SESSION_COOKIE)?.value().to_owned();
    if token.is_empty() {
        warn!("empty session cookie");
        return None;
    }
    Some(token)
}
