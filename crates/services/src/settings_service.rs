use std::sync::Arc;

use nexus_core::model::{PlatformSettings, PlatformSettingsDraft, User};
use storage::repository::SettingsRepository;
use tracing::info;

use crate::error::SettingsServiceError;

/// Loads and persists the platform-wide settings row.
#[derive(Clone)]
pub struct SettingsService {
    settings: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsRepository>) -> Self {
        Self { settings }
    }

    /// Stored settings, or defaults when none have been saved yet.
    ///
    /// # Errors
    ///
    /// Returns `SettingsServiceError::Storage` if repository access fails.
    pub async fn load(&self) -> Result<PlatformSettings, SettingsServiceError> {
        Ok(self.settings.get_settings().await?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns `SettingsServiceError::Forbidden` for non-admins and
    /// `SettingsServiceError::Settings` for invalid drafts.
    pub async fn save(
        &self,
        actor: &User,
        draft: PlatformSettingsDraft,
    ) -> Result<PlatformSettings, SettingsServiceError> {
        if !actor.role.is_admin() {
            return Err(SettingsServiceError::Forbidden);
        }
        let settings = draft.validate()?;
        self.settings.save_settings(&settings).await?;
        info!(
            registration = settings.allow_public_registration(),
            email = settings.email_notifications_enabled(),
            "platform settings saved"
        );
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::model::{Role, SettingsError, UserId};
    use nexus_core::time::fixed_now;
    use storage::InMemoryRepository;

    fn user(role: Role) -> User {
        User {
            id: UserId::new(1),
            email: "admin@corp.example".into(),
            name: "Admin".into(),
            role,
            xp: 0,
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn defaults_until_saved() {
        let service = SettingsService::new(Arc::new(InMemoryRepository::new()));
        assert_eq!(service.load().await.unwrap(), PlatformSettings::default());

        let draft = PlatformSettingsDraft {
            platform_name: Some("Acme Academy".into()),
            allow_public_registration: true,
            ..PlatformSettingsDraft::default()
        };
        service.save(&user(Role::Administrator), draft).await.unwrap();
        let loaded = service.load().await.unwrap();
        assert_eq!(loaded.platform_name(), "Acme Academy");
        assert!(loaded.allow_public_registration());
    }

    #[tokio::test]
    async fn only_admins_save_valid_drafts() {
        let service = SettingsService::new(Arc::new(InMemoryRepository::new()));
        assert!(matches!(
            service
                .save(&user(Role::Instructor), PlatformSettingsDraft::default())
                .await,
            Err(SettingsServiceError::Forbidden)
        ));

        let draft = PlatformSettingsDraft {
            email_provider_url: Some("not a url".into()),
            ..PlatformSettingsDraft::default()
        };
        assert!(matches!(
            service.save(&user(Role::Administrator), draft).await,
            Err(SettingsServiceError::Settings(SettingsError::InvalidProviderUrl))
        ));
    }
}
