use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub app_env: AppEnv,

    /// PostgreSQL message store; unset falls back to the in-memory store
    pub database_url: Option<String>,
    /// Redis preference store; unset falls back to the in-memory store
    pub redis_url: Option<String>,

    /// JSON contact registry
    pub contacts_path: String,

    /// Bearer token required on /api routes; unset leaves them open
    pub api_token: Option<String>,

    // Twilio (SMS channel + inbound webhook verification)
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_from_number: Option<String>,
    /// Canonical public URLs tried during webhook signature validation,
    /// in order, after the URL the handler itself saw
    pub twilio_webhook_urls: Vec<String>,
    /// Reject webhooks that fail signature validation (fail-closed).
    /// Defaults to on in production, off elsewhere.
    pub twilio_enforce_signature: bool,

    // SendGrid (email channel)
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: Option<String>,
    /// Subject line for outbound emails
    pub email_subject: String,

    /// Per-channel send bound; a channel that exceeds it is reported as a
    /// timeout failure without blocking the other channel
    pub channel_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let app_env = match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => AppEnv::Production,
            _ => AppEnv::Development,
        };

        Ok(Self {
            http_port: std::env::var("HTTP_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("HTTP_PORT must be a valid port number")?,
            app_env,

            database_url: std::env::var("DATABASE_URL").ok(),
            redis_url: std::env::var("REDIS_URL").ok(),

            contacts_path: std::env::var("CONTACTS_PATH")
                .unwrap_or_else(|_| "contacts.json".to_string()),

            api_token: std::env::var("HEARTH_API_TOKEN").ok(),

            twilio_account_sid: std::env::var("TWILIO_ACCOUNT_SID").ok(),
            twilio_auth_token: std::env::var("TWILIO_AUTH_TOKEN").ok(),
            twilio_from_number: std::env::var("TWILIO_FROM_NUMBER").ok(),
            twilio_webhook_urls: std::env::var("TWILIO_WEBHOOK_URLS")
                .map(|s| {
                    s.split(',')
                        .map(|u| u.trim().to_string())
                        .filter(|u| !u.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            twilio_enforce_signature: std::env::var("TWILIO_ENFORCE_SIGNATURE")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(app_env == AppEnv::Production),

            sendgrid_api_key: std::env::var("SENDGRID_API_KEY").ok(),
            sendgrid_from_email: std::env::var("SENDGRID_FROM_EMAIL").ok(),
            email_subject: std::env::var("EMAIL_SUBJECT")
                .unwrap_or_else(|_| "New family message".to_string()),

            channel_timeout_secs: std::env::var("CHANNEL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        })
    }
}
