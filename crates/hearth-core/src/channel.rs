//! Outbound channel adapters
//!
//! Two symmetric senders behind one trait: SMS via Twilio and email via
//! SendGrid. Each adapter makes exactly one delivery attempt and reports the
//! provider message id or the provider's error; retry policy belongs to the
//! caller (there is none).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use hearth_providers::{SendGridClient, TwilioClient};

/// A message transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Sms,
    Email,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Sms => "sms",
            ChannelKind::Email => "email",
        }
    }
}

impl FromStr for ChannelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(ChannelKind::Sms),
            "email" => Ok(ChannelKind::Email),
            _ => Err(anyhow::anyhow!(
                "Invalid channel: {}. Must be 'sms' or 'email'",
                s
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("provider rejected send: {0}")]
    Provider(String),
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of one delivery attempt on one channel
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSendResult {
    pub channel: ChannelKind,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelSendResult {
    pub fn ok(channel: ChannelKind, provider_message_id: String) -> Self {
        Self {
            channel,
            success: true,
            provider_message_id: Some(provider_message_id),
            error: None,
        }
    }

    pub fn failed(channel: ChannelKind, error: String) -> Self {
        Self {
            channel,
            success: false,
            provider_message_id: None,
            error: Some(error),
        }
    }
}

/// Uniform send interface over one message transport
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Single delivery attempt; returns the provider-assigned message id
    async fn send(&self, to: &str, body: &str) -> Result<String, ChannelError>;

    /// Address the outbound message is sent from (for the persisted record)
    fn from_address(&self) -> &str;
}

/// SMS delivery via the Twilio Messages API
pub struct SmsChannel {
    client: TwilioClient,
    from_number: String,
}

impl SmsChannel {
    pub fn new(client: TwilioClient, from_number: String) -> Self {
        Self {
            client,
            from_number,
        }
    }
}

#[async_trait]
impl ChannelSender for SmsChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(&self, to: &str, body: &str) -> Result<String, ChannelError> {
        self.client
            .send_sms(&self.from_number, to, body)
            .await
            .map_err(|e| ChannelError::Provider(e.to_string()))
    }

    fn from_address(&self) -> &str {
        &self.from_number
    }
}

/// Email delivery via the SendGrid mail/send API
pub struct EmailChannel {
    client: SendGridClient,
    from_email: String,
    subject: String,
}

impl EmailChannel {
    pub fn new(client: SendGridClient, from_email: String, subject: String) -> Self {
        Self {
            client,
            from_email,
            subject,
        }
    }
}

#[async_trait]
impl ChannelSender for EmailChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, to: &str, body: &str) -> Result<String, ChannelError> {
        self.client
            .send_email(&self.from_email, to, &self.subject, body)
            .await
            .map_err(|e| ChannelError::Provider(e.to_string()))
    }

    fn from_address(&self) -> &str {
        &self.from_email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kind_round_trip() {
        assert_eq!("sms".parse::<ChannelKind>().unwrap(), ChannelKind::Sms);
        assert_eq!("email".parse::<ChannelKind>().unwrap(), ChannelKind::Email);
        assert_eq!(ChannelKind::Sms.as_str(), "sms");
        assert!("fax".parse::<ChannelKind>().is_err());
    }

    #[test]
    fn test_send_result_shape() {
        let ok = ChannelSendResult::ok(ChannelKind::Sms, "SM123".to_string());
        assert!(ok.success);
        assert_eq!(ok.provider_message_id.as_deref(), Some("SM123"));
        assert!(ok.error.is_none());

        let failed = ChannelSendResult::failed(ChannelKind::Email, "boom".to_string());
        assert!(!failed.success);
        assert!(failed.provider_message_id.is_none());
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
