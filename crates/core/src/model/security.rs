use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{SecurityLogId, UserId};

/// Kinds of security-relevant events recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEvent {
    SuccessfulLogin,
    FailedLogin,
    LoginRateLimited,
    RoleChanged,
}

impl SecurityEvent {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityEvent::SuccessfulLogin => "SUCCESSFUL_LOGIN",
            SecurityEvent::FailedLogin => "FAILED_LOGIN",
            SecurityEvent::LoginRateLimited => "LOGIN_RATE_LIMITED",
            SecurityEvent::RoleChanged => "ROLE_CHANGED",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SUCCESSFUL_LOGIN" => Some(SecurityEvent::SuccessfulLogin),
            "FAILED_LOGIN" => Some(SecurityEvent::FailedLogin),
            "LOGIN_RATE_LIMITED" => Some(SecurityEvent::LoginRateLimited),
            "ROLE_CHANGED" => Some(SecurityEvent::RoleChanged),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityLog {
    pub id: SecurityLogId,
    pub event: SecurityEvent,
    pub user_id: Option<UserId>,
    pub email_attempt: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSecurityLog {
    pub event: SecurityEvent,
    pub user_id: Option<UserId>,
    pub email_attempt: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewSecurityLog {
    #[must_use]
    pub fn new(event: SecurityEvent, created_at: DateTime<Utc>) -> Self {
        Self {
            event,
            user_id: None,
            email_attempt: None,
            ip_address: None,
            details: None,
            created_at,
        }
    }

    #[must_use]
    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email_attempt = Some(email.into());
        self
    }

    #[must_use]
    pub fn ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    #[must_use]
    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
