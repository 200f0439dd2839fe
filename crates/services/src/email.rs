//! Outbound email: transports plus a dispatcher that applies platform settings.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use storage::repository::SettingsRepository;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::EmailError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a single message.
    ///
    /// # Errors
    ///
    /// Returns `EmailError` when the transport rejects or cannot reach the provider.
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError>;
}

/// Posts each message as JSON to an HTTP email provider.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    endpoint: String,
}

impl HttpMailer {
    #[must_use]
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        let response = self.client.post(&self.endpoint).json(email).send().await?;
        if !response.status().is_success() {
            return Err(EmailError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        info!(to = %email.to, subject = %email.subject, "email (log transport)");
        Ok(())
    }
}

/// How the dispatcher picks a mailer.
#[derive(Clone)]
pub enum MailTransport {
    /// `HttpMailer` against the configured provider URL, `LogMailer` when unset.
    Provider(Client),
    /// Always use the given mailer.
    Fixed(Arc<dyn Mailer>),
}

/// Applies the notifications flag and whitelist, then sends in the background.
#[derive(Clone)]
pub struct EmailDispatcher {
    settings: Arc<dyn SettingsRepository>,
    transport: MailTransport,
}

impl EmailDispatcher {
    #[must_use]
    pub fn new(settings: Arc<dyn SettingsRepository>, transport: MailTransport) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Queue messages for delivery without waiting on the provider.
    ///
    /// Returns the background task when anything was queued. Failures are
    /// logged and dropped.
    pub async fn dispatch(&self, emails: Vec<OutgoingEmail>) -> Option<JoinHandle<()>> {
        let settings = match self.settings.get_settings().await {
            Ok(settings) => settings.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "could not load settings, skipping email");
                return None;
            }
        };
        if !settings.email_notifications_enabled() {
            debug!(count = emails.len(), "email notifications disabled");
            return None;
        }

        let total = emails.len();
        let allowed: Vec<OutgoingEmail> = emails
            .into_iter()
            .filter(|email| settings.allows_recipient(&email.to))
            .collect();
        if allowed.len() < total {
            debug!(dropped = total - allowed.len(), "recipients not on email whitelist");
        }
        if allowed.is_empty() {
            return None;
        }

        let mailer: Arc<dyn Mailer> = match &self.transport {
            MailTransport::Fixed(mailer) => Arc::clone(mailer),
            MailTransport::Provider(client) => match settings.email_provider_url() {
                Some(url) => Arc::new(HttpMailer::new(client.clone(), url)),
                None => Arc::new(LogMailer),
            },
        };

        Some(tokio::spawn(async move {
            for email in allowed {
                if let Err(err) = mailer.send(&email).await {
                    warn!(to = %email.to, error = %err, "email delivery failed");
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_core::model::PlatformSettingsDraft;
    use std::sync::Mutex;
    use storage::InMemoryRepository;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
            self.sent.lock().unwrap().push(email.to.clone());
            Ok(())
        }
    }

    fn email(to: &str) -> OutgoingEmail {
        OutgoingEmail {
            to: to.into(),
            subject: "Hello".into(),
            body: "Body".into(),
        }
    }

    #[tokio::test]
    async fn disabled_flag_sends_nothing() {
        let repo = Arc::new(InMemoryRepository::new());
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = EmailDispatcher::new(repo, MailTransport::Fixed(mailer.clone()));

        assert!(dispatcher.dispatch(vec![email("a@corp.example")]).await.is_none());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn whitelist_filters_recipients() {
        let repo = Arc::new(InMemoryRepository::new());
        let settings = PlatformSettingsDraft {
            email_notifications_enabled: true,
            email_whitelist: vec!["qa@corp.example".into()],
            ..PlatformSettingsDraft::default()
        }
        .validate()
        .unwrap();
        repo.save_settings(&settings).await.unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = EmailDispatcher::new(repo, MailTransport::Fixed(mailer.clone()));
        let handle = dispatcher
            .dispatch(vec![email("qa@corp.example"), email("ceo@corp.example")])
            .await
            .expect("queued");
        handle.await.unwrap();

        assert_eq!(*mailer.sent.lock().unwrap(), vec!["qa@corp.example".to_string()]);
    }
}
