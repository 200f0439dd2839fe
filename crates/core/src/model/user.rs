use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::UserId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("user name cannot be empty")]
    EmptyName,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,
}

/// Minimum accepted password length for new accounts.
pub const MIN_PASSWORD_LEN: usize = 8;

//
// ─── ROLE ──────────────────────────────────────────────────────────────────────
//

/// Authorization role carried by every session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Administrator,
    Instructor,
    Student,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Administrator => "ADMINISTRATOR",
            Role::Instructor => "INSTRUCTOR",
            Role::Student => "STUDENT",
        }
    }

    /// Parses the persisted/wire representation.
    ///
    /// # Errors
    ///
    /// Returns `UserError::UnknownRole` for anything else.
    pub fn parse(s: &str) -> Result<Self, UserError> {
        match s {
            "ADMINISTRATOR" => Ok(Role::Administrator),
            "INSTRUCTOR" => Ok(Role::Instructor),
            "STUDENT" => Ok(Role::Student),
            other => Err(UserError::UnknownRole(other.to_owned())),
        }
    }

    /// Administrators and instructors may author courses, forms and events.
    #[must_use]
    pub fn can_author(self) -> bool {
        matches!(self, Role::Administrator | Role::Instructor)
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Administrator)
    }
}

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub xp: u32,
    pub created_at: DateTime<Utc>,
}

/// Unvalidated input for creating an account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl NewUser {
    /// Trims and validates the draft, lowercasing the email.
    ///
    /// # Errors
    ///
    /// Returns `UserError` when the name is blank or the email is malformed.
    pub fn validate(self) -> Result<Self, UserError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(UserError::EmptyName);
        }
        let email = normalize_email(&self.email)?;
        Ok(Self {
            email,
            name,
            role: self.role,
        })
    }
}

/// Lowercases and sanity-checks an email address.
///
/// # Errors
///
/// Returns `UserError::InvalidEmail` if there is no local part or domain.
pub fn normalize_email(raw: &str) -> Result<String, UserError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(UserError::InvalidEmail(raw.to_owned())),
    }
}

/// Checks the password policy for new accounts.
///
/// # Errors
///
/// Returns `UserError::PasswordTooShort` below [`MIN_PASSWORD_LEN`].
pub fn check_password_policy(password: &str) -> Result<(), UserError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserError::PasswordTooShort);
    }
    Ok(())
}
