//! Email collaborator.

use reqwest::Client;
use serde::Serialize;

use crate::core::http::post_json;
use crate::error::{Result, ShowroomError};
use crate::storage::config::EmailConfig;

/// Body accepted by the email API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

/// Sends notification mail through an HTTP email API.
#[derive(Debug, Clone)]
pub struct Mailer {
    client: Client,
    config: EmailConfig,
}

impl Mailer {
    #[must_use]
    pub const fn new(client: Client, config: EmailConfig) -> Self {
        Self { client, config }
    }

    /// Whether an API key and a recipient are set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Send a plain-text message to the configured recipient.
    ///
    /// # Errors
    /// Returns [`ShowroomError::NotConfigured`] without key or recipient, or
    /// [`ShowroomError::EmailSend`] when the API fails or rejects the message.
    pub async fn send(&self, subject: &str, text: &str) -> Result<()> {
        let (Some(key), Some(to)) = (self.config.api_key.as_deref(), self.config.to.as_deref())
        else {
            return Err(ShowroomError::NotConfigured("email"));
        };

        let message = EmailMessage {
            from: self.config.from.clone(),
            to: vec![to.to_string()],
            subject: subject.to_string(),
            text: text.to_string(),
        };

        post_json(&self.client, &self.config.api_url, Some(key), &message)
            .await
            .map_err(|e| ShowroomError::EmailSend(e.to_string()))?;

        tracing::debug!(subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_mailer_refuses() {
        let mailer = Mailer::new(Client::new(), EmailConfig::default());
        assert!(!mailer.is_configured());
        let err = mailer.send("subject", "text").await.unwrap_err();
        assert_eq!(err.error_code(), "SHOW-D003");
    }
}
