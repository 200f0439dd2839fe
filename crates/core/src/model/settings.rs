use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::user::normalize_email;

/// Administrator-managed platform configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlatformSettings {
    platform_name: String,
    allow_public_registration: bool,
    email_notifications_enabled: bool,
    email_whitelist: Vec<String>,
    email_provider_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PlatformSettingsDraft {
    pub platform_name: Option<String>,
    #[serde(default)]
    pub allow_public_registration: bool,
    #[serde(default)]
    pub email_notifications_enabled: bool,
    #[serde(default)]
    pub email_whitelist: Vec<String>,
    pub email_provider_url: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("invalid email provider URL")]
    InvalidProviderUrl,

    #[error("invalid whitelist address: {0}")]
    InvalidWhitelistEntry(String),
}

pub const DEFAULT_PLATFORM_NAME: &str = "NexusAlpri";

impl PlatformSettingsDraft {
    /// Validate and normalize the draft into persisted settings.
    ///
    /// Whitelist entries are lowercased and deduplicated.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the provider URL or a whitelist entry is invalid.
    pub fn validate(self) -> Result<PlatformSettings, SettingsError> {
        let platform_name = normalize_optional(self.platform_name)
            .unwrap_or_else(|| DEFAULT_PLATFORM_NAME.to_owned());
        let email_provider_url = normalize_optional(self.email_provider_url);

        if let Some(url) = email_provider_url.as_ref() {
            if Url::parse(url).is_err() {
                return Err(SettingsError::InvalidProviderUrl);
            }
        }

        let mut email_whitelist = Vec::with_capacity(self.email_whitelist.len());
        for entry in self.email_whitelist {
            if entry.trim().is_empty() {
                continue;
            }
            let email = normalize_email(&entry)
                .map_err(|_| SettingsError::InvalidWhitelistEntry(entry.clone()))?;
            if !email_whitelist.contains(&email) {
                email_whitelist.push(email);
            }
        }

        Ok(PlatformSettings {
            platform_name,
            allow_public_registration: self.allow_public_registration,
            email_notifications_enabled: self.email_notifications_enabled,
            email_whitelist,
            email_provider_url,
        })
    }
}

impl PlatformSettings {
    #[must_use]
    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    #[must_use]
    pub fn allow_public_registration(&self) -> bool {
        self.allow_public_registration
    }

    #[must_use]
    pub fn email_notifications_enabled(&self) -> bool {
        self.email_notifications_enabled
    }

    #[must_use]
    pub fn email_whitelist(&self) -> &[String] {
        &self.email_whitelist
    }

    #[must_use]
    pub fn email_provider_url(&self) -> Option<&str> {
        self.email_provider_url.as_deref()
    }

    /// An empty whitelist allows every recipient.
    #[must_use]
    pub fn allows_recipient(&self, email: &str) -> bool {
        self.email_whitelist.is_empty()
            || self
                .email_whitelist
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(email.trim()))
    }
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            platform_name: DEFAULT_PLATFORM_NAME.to_owned(),
            allow_public_registration: false,
            email_notifications_enabled: false,
            email_whitelist: Vec::new(),
            email_provider_url: None,
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_provider_url() {
        let draft = PlatformSettingsDraft {
            email_provider_url: Some("not a url".into()),
            ..PlatformSettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidProviderUrl);
    }

    #[test]
    fn whitelist_is_normalized() {
        let settings = PlatformSettingsDraft {
            email_whitelist: vec![
                "QA@Corp.example".into(),
                "qa@corp.example".into(),
                "  ".into(),
            ],
            ..PlatformSettingsDraft::default()
        }
        .validate()
        .unwrap();
        assert_eq!(settings.email_whitelist(), ["qa@corp.example"]);
        assert!(settings.allows_recipient("QA@corp.example"));
        assert!(!settings.allows_recipient("ceo@corp.example"));
    }

    #[test]
    fn empty_whitelist_allows_everyone() {
        let settings = PlatformSettings::default();
        assert!(settings.allows_recipient("anyone@corp.example"));
        assert_eq!(settings.platform_name(), DEFAULT_PLATFORM_NAME);
    }
}
