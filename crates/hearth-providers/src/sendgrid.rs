//! SendGrid email client
//!
//! Wraps the v3 mail/send endpoint. A successful send answers 202 with the
//! queued message id in the `X-Message-Id` response header.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SENDGRID_API_BASE: &str = "https://api.sendgrid.com/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Stand-in id when the provider accepts a send without reporting one
const ACCEPTED_WITHOUT_ID: &str = "accepted";

#[derive(Debug, thiserror::Error)]
pub enum SendGridError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

#[derive(Clone)]
pub struct SendGridClient {
    client: reqwest::Client,
    api_key: Arc<String>,
    base_url: String,
}

impl SendGridClient {
    pub fn new(api_key: String) -> Result<Self, SendGridError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Hearth/0.1.0")
            .build()?;

        Ok(Self {
            client,
            api_key: Arc::new(api_key),
            base_url: SENDGRID_API_BASE.to_string(),
        })
    }

    /// Override the API base URL (local stubs in tests)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Send a plain-text email and return the provider-assigned message id
    pub async fn send_email(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<String, SendGridError> {
        let url = format!("{}/mail/send", self.base_url);

        debug!("Sending email to {} ({} chars)", to, body.len());

        let payload = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": from },
            "subject": subject,
            "content": [{ "type": "text/plain", "value": body }],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| format!("status {}", status));
            return Err(SendGridError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(ACCEPTED_WITHOUT_ID)
            .to_string();

        debug!("Email accepted by provider: {}", message_id);
        Ok(message_id)
    }
}
