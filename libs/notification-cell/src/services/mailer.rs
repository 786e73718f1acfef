use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::NotificationError;

/// Thin client for the outbound mail HTTP API.
pub struct MailerClient {
    client: Client,
    api_url: String,
    api_token: String,
    from: String,
}

impl MailerClient {
    /// Returns `None` when the mail environment variables are absent;
    /// callers degrade to logging instead of sending.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        if !config.is_mail_configured() {
            return None;
        }

        Some(Self {
            client: Client::new(),
            api_url: config.mail_api_url.clone(),
            api_token: config.mail_api_token.clone(),
            from: config.mail_from.clone(),
        })
    }

    pub async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), NotificationError> {
        let url = format!("{}/messages", self.api_url);

        let request_body = json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "text": text
        });

        debug!("Sending mail request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| NotificationError::MailError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let response_text = response.text().await.unwrap_or_default();
            error!("Mail API request failed: {} - {}", status, response_text);
            return Err(NotificationError::MailError(format!(
                "HTTP {}: {}",
                status, response_text
            )));
        }

        info!("Mail accepted for delivery to {}", to);
        Ok(())
    }
}
