//! Twilio SMS client
//!
//! Wraps the Messages endpoint of the Twilio REST API. Sends are a single
//! form-encoded POST authenticated with the account SID and auth token.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TwilioError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Message resource returned on a successful send
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

/// Error body returned by the API on a failed send
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct TwilioClient {
    client: reqwest::Client,
    account_sid: String,
    auth_token: Arc<String>,
    base_url: String,
}

impl TwilioClient {
    pub fn new(account_sid: String, auth_token: String) -> Result<Self, TwilioError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Hearth/0.1.0")
            .build()?;

        Ok(Self {
            client,
            account_sid,
            auth_token: Arc::new(auth_token),
            base_url: TWILIO_API_BASE.to_string(),
        })
    }

    /// Override the API base URL (local stubs in tests)
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Send an SMS and return the provider-assigned message SID
    pub async fn send_sms(&self, from: &str, to: &str, body: &str) -> Result<String, TwilioError> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        );

        debug!("Sending SMS to {} ({} chars)", to, body.len());

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(self.auth_token.as_str()))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ApiErrorBody>().await {
                Ok(err) => err.message,
                Err(_) => format!("status {}", status),
            };
            return Err(TwilioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let resource: MessageResource = response.json().await?;
        debug!("SMS accepted by provider: {}", resource.sid);
        Ok(resource.sid)
    }
}
