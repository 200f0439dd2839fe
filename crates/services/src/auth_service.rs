//! Credentials, sessions, user administration, and the security log.

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use chrono::Duration;
use nexus_core::model::{
    NewSecurityLog, NewUser, Role, SecurityEvent, SecurityLog, User, UserId,
    check_password_policy, normalize_email,
};
use rand::Rng;
use storage::repository::{
    SecurityLogRepository, SessionRecord, SessionRepository, SettingsRepository, StorageError,
    UserRepository,
};
use tracing::{info, warn};

use crate::Clock;
use crate::error::AuthError;
use crate::password::{hash_password, verify_password};
use crate::rate_limit::RateLimiter;

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;
pub const SECURITY_LOG_PAGE: u32 = 200;

const TOKEN_BYTES: usize = 32;

/// Repositories the auth service reads and writes.
#[derive(Clone)]
pub struct AuthRepositories {
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub security_logs: Arc<dyn SecurityLogRepository>,
    pub settings: Arc<dyn SettingsRepository>,
}

/// A successful login: the user and the session that now identifies them.
#[derive(Debug, Clone)]
pub struct LoginSession {
    pub user: User,
    pub session: SessionRecord,
}

#[derive(Clone)]
pub struct AuthService {
    clock: Clock,
    repos: AuthRepositories,
    limiter: Arc<RateLimiter>,
    session_ttl: Duration,
}

impl AuthService {
    #[must_use]
    pub fn new(clock: Clock, repos: AuthRepositories, session_ttl: Duration) -> Self {
        Self {
            clock: clock.clone(),
            repos,
            limiter: Arc::new(RateLimiter::for_logins(clock.clone())),
            session_ttl,
        }
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Arc::new(limiter);
        self
    }

    /// Verify credentials and open a session.
    ///
    /// Every attempt, successful or not, spends one unit of the email's
    /// login quota.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RateLimited` while the email is throttled,
    /// `AuthError::InvalidCredentials` for unknown emails or wrong passwords
    /// and `AuthError::SessionTtlOutOfRange` if the expiry cannot be
    /// represented.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        ip: Option<String>,
    ) -> Result<LoginSession, AuthError> {
        let now = self.clock.now();
        let key = email.trim().to_lowercase();

        if !self.limiter.check(&key) {
            warn!(email = %key, "login rate limited");
            self.audit(
                NewSecurityLog::new(SecurityEvent::LoginRateLimited, now)
                    .email(key.as_str())
                    .ip(ip),
            )
            .await;
            return Err(AuthError::RateLimited);
        }

        let credentials = self.repos.users.find_credentials(&key).await?;
        let verified = match &credentials {
            Some(found) => verify_password(password, &found.password_hash)?,
            None => {
                // Unknown emails pay for a hash check too.
                if let Some(hash) = unknown_user_hash() {
                    verify_password(password, hash)?;
                }
                false
            }
        };
        let Some(credentials) = credentials.filter(|_| verified) else {
            info!(email = %key, "login failed");
            self.audit(
                NewSecurityLog::new(SecurityEvent::FailedLogin, now)
                    .email(key.as_str())
                    .ip(ip),
            )
            .await;
            return Err(AuthError::InvalidCredentials);
        };

        let user = credentials.user;
        let expires_at = now
            .checked_add_signed(self.session_ttl)
            .ok_or(AuthError::SessionTtlOutOfRange)?;
        let session = SessionRecord {
            token: new_token(),
            user_id: user.id,
            created_at: now,
            expires_at,
        };
        self.repos.sessions.create_session(&session).await?;
        info!(user = %user.id, "login succeeded");
        self.audit(
            NewSecurityLog::new(SecurityEvent::SuccessfulLogin, now)
                .user(user.id)
                .email(user.email.as_str())
                .ip(ip),
        )
        .await;
        Ok(LoginSession { user, session })
    }

    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the session cannot be removed.
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        Ok(self.repos.sessions.delete_session(token).await?)
    }

    /// Resolve a session token to its user.
    ///
    /// Unknown and expired tokens resolve to `None`; expired ones are removed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if repository access fails.
    pub async fn authenticate(&self, token: &str) -> Result<Option<User>, AuthError> {
        let Some(session) = self.repos.sessions.find_session(token).await? else {
            return Ok(None);
        };
        if session.expires_at <= self.clock.now() {
            self.repos.sessions.delete_session(token).await?;
            return Ok(None);
        }
        Ok(self.repos.users.get_user(session.user_id).await?)
    }

    /// Self-service sign-up as a student, when enabled in settings.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RegistrationClosed` when public registration is off.
    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let settings = self
            .repos
            .settings
            .get_settings()
            .await?
            .unwrap_or_default();
        if !settings.allow_public_registration() {
            return Err(AuthError::RegistrationClosed);
        }
        let user = self
            .insert(
                NewUser {
                    email: email.to_owned(),
                    name: name.to_owned(),
                    role: Role::Student,
                },
                password,
            )
            .await?;
        info!(user = %user.id, "user registered");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` for non-admins and
    /// `AuthError::EmailTaken` when the email is already registered.
    pub async fn create_user(
        &self,
        actor: &User,
        user: NewUser,
        password: &str,
    ) -> Result<User, AuthError> {
        require_admin(actor)?;
        let user = self.insert(user, password).await?;
        info!(user = %user.id, role = user.role.as_str(), by = %actor.id, "user created");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` for non-admins.
    pub async fn change_role(
        &self,
        actor: &User,
        user_id: UserId,
        role: Role,
        ip: Option<String>,
    ) -> Result<User, AuthError> {
        require_admin(actor)?;
        let before = self
            .repos
            .users
            .get_user(user_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        let updated = self.repos.users.update_role(user_id, role).await?;
        info!(user = %user_id, from = before.role.as_str(), to = role.as_str(), "role changed");
        self.audit(
            NewSecurityLog::new(SecurityEvent::RoleChanged, self.clock.now())
                .user(user_id)
                .ip(ip)
                .details(format!(
                    "{} -> {} by user {}",
                    before.role.as_str(),
                    role.as_str(),
                    actor.id
                )),
        )
        .await;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` for non-admins.
    pub async fn list_users(
        &self,
        actor: &User,
        role: Option<Role>,
    ) -> Result<Vec<User>, AuthError> {
        require_admin(actor)?;
        Ok(self.repos.users.list_users(role).await?)
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` for non-admins.
    pub async fn security_logs(
        &self,
        actor: &User,
        limit: Option<u32>,
    ) -> Result<Vec<SecurityLog>, AuthError> {
        require_admin(actor)?;
        let limit = limit.unwrap_or(SECURITY_LOG_PAGE).min(SECURITY_LOG_PAGE);
        Ok(self.repos.security_logs.list_logs(limit).await?)
    }

    /// Create the bootstrap administrator unless the email already exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the account cannot be created.
    pub async fn ensure_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        if let Some(existing) = self.repos.users.find_credentials(&email).await? {
            return Ok(existing.user);
        }
        let user = self
            .insert(
                NewUser {
                    email,
                    name: name.to_owned(),
                    role: Role::Administrator,
                },
                password,
            )
            .await?;
        info!(user = %user.id, "bootstrap administrator created");
        Ok(user)
    }

    async fn insert(&self, user: NewUser, password: &str) -> Result<User, AuthError> {
        let user = user.validate()?;
        check_password_policy(password)?;
        let hash = hash_password(password)?;
        match self
            .repos
            .users
            .insert_user(&user, &hash, self.clock.now())
            .await
        {
            Ok(user) => Ok(user),
            Err(StorageError::Conflict) => Err(AuthError::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    async fn audit(&self, log: NewSecurityLog) {
        let event = log.event.as_str();
        if let Err(err) = self.repos.security_logs.insert_log(&log).await {
            warn!(event, error = %err, "security log write failed");
        }
    }
}

fn require_admin(actor: &User) -> Result<(), AuthError> {
    if actor.role.is_admin() {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

fn unknown_user_hash() -> Option<&'static str> {
    static HASH: OnceLock<Option<String>> = OnceLock::new();
    HASH.get_or_init(|| hash_password("no such user").ok())
        .as_deref()
}

fn new_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    bytes.iter().fold(String::with_capacity(TOKEN_BYTES * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::time::fixed_now;
    use storage::repository::Storage;

    fn service(clock: &Clock, session_ttl: Duration) -> AuthService {
        let storage = Storage::in_memory();
        AuthService::new(
            clock.clone(),
            AuthRepositories {
                users: Arc::clone(&storage.users),
                sessions: Arc::clone(&storage.sessions),
                security_logs: Arc::clone(&storage.security_logs),
                settings: Arc::clone(&storage.settings),
            },
            session_ttl,
        )
    }

    #[tokio::test]
    async fn custom_limiter_threshold_applies() {
        let clock = Clock::manual(fixed_now());
        let auth = service(&clock, Duration::hours(1))
            .with_rate_limiter(RateLimiter::new(clock.clone(), 2, Duration::minutes(1)));
        auth.ensure_admin("root@corp.example", "Root", "correct horse")
            .await
            .unwrap();
        for _ in 0..2 {
            assert!(matches!(
                auth.login("root@corp.example", "wrong password", None).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            auth.login("ROOT@corp.example", "correct horse", None).await,
            Err(AuthError::RateLimited)
        ));

        clock.advance(Duration::seconds(30));
        auth.login("root@corp.example", "correct horse", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_emails_fail_like_wrong_passwords() {
        let clock = Clock::manual(fixed_now());
        let auth = service(&clock, Duration::hours(1));
        for _ in 0..5 {
            assert!(matches!(
                auth.login("ghost@corp.example", "whatever", None).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            auth.login("ghost@corp.example", "whatever", None).await,
            Err(AuthError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn unrepresentable_session_expiry_is_an_error() {
        let clock = Clock::manual(fixed_now());
        let auth = service(&clock, Duration::hours(3_000_000_000));
        auth.ensure_admin("root@corp.example", "Root", "correct horse")
            .await
            .unwrap();
        assert!(matches!(
            auth.login("root@corp.example", "correct horse", None).await,
            Err(AuthError::SessionTtlOutOfRange)
        ));
    }

    #[test]
    fn tokens_are_random_hex() {
        let a = new_token();
        let b = new_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
