//! Inbound webhook dispatcher
//!
//! One POST endpoint receives both provider callbacks. The Content-Type
//! decides the path: multipart/form-data is the email provider's parse hook,
//! anything else is the SMS provider's URL-encoded form. Providers treat any
//! non-200 response as a delivery failure and retry destructively, so every
//! outcome — including internal errors — is answered with HTTP 200 and a
//! protocol-appropriate envelope.

use axum::body::to_bytes;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::{CONTENT_TYPE, HOST};
use axum::http::{HeaderMap, Uri};
use axum::response::{IntoResponse, Response};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::channel::ChannelKind;
use crate::normalize::{
    clean_reply_content, extract_address, extract_sender_name, strip_html_tags,
    unknown_sender_name,
};
use crate::server::AppState;
use crate::signature::{validate_request, SIGNATURE_HEADER};
use crate::store::{Direction, NewUnifiedMessage};

/// Largest webhook body we are willing to buffer
const MAX_BODY_BYTES: usize = 1024 * 1024;

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// SMS provider response envelope (TwiML)
fn twiml_message(text: &str) -> Response {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        xml_escape(text)
    );
    ([(CONTENT_TYPE, "application/xml")], body).into_response()
}

/// Email provider response envelope
fn plain_text(text: &str) -> Response {
    ([(CONTENT_TYPE, "text/plain")], text.to_string()).into_response()
}

/// Entry point for both providers. Branches on Content-Type and converts any
/// internal failure into a 200 envelope in the matching provider dialect.
pub async fn inbound_webhook(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let is_email = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_email {
        match handle_email(state, request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Email webhook failed: {:#}", e);
                plain_text("Error processing email")
            }
        }
    } else {
        match handle_sms(state, request).await {
            Ok(response) => response,
            Err(e) => {
                error!("SMS webhook failed: {:#}", e);
                twiml_message("Unable to process message")
            }
        }
    }
}

/// The request URL as this handler saw it, rebuilt from the Host header.
/// Proxies in front of the service may have rewritten it, which is why
/// signature validation also tries the configured canonical URLs.
fn seen_url(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let host = headers.get(HOST)?.to_str().ok()?;
    Some(format!("https://{}{}", host, uri))
}

/// Check the provider signature on an SMS webhook. Returns false only when
/// the request should be rejected: verification failures are always logged
/// as security events, but only enforcement mode turns them into rejections.
fn sms_signature_ok(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    params: &BTreeMap<String, String>,
) -> bool {
    let auth_token = match &state.config.twilio_auth_token {
        Some(token) => token,
        None => return true,
    };

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let valid = match provided {
        Some(signature) => validate_request(
            auth_token,
            seen_url(headers, uri).as_deref(),
            &state.config.twilio_webhook_urls,
            params,
            signature,
        ),
        None => false,
    };

    if valid {
        return true;
    }

    warn!(
        "SMS webhook signature verification failed (from={:?}, signature_present={}, enforcing={})",
        params.get("From"),
        provided.is_some(),
        state.config.twilio_enforce_signature
    );
    !state.config.twilio_enforce_signature
}

async fn handle_sms(state: Arc<AppState>, request: Request) -> anyhow::Result<Response> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read SMS webhook body: {}", e))?;

    let params: BTreeMap<String, String> =
        url::form_urlencoded::parse(&bytes).into_owned().collect();

    if !sms_signature_ok(&state, &parts.headers, &parts.uri, &params) {
        return Ok(twiml_message("Signature verification failed"));
    }

    let (body_text, from, to) = match (params.get("Body"), params.get("From"), params.get("To")) {
        (Some(body), Some(from), Some(to)) => (body, from, to),
        _ => {
            warn!("SMS webhook missing required fields (got: {:?})", params.keys());
            return Ok(twiml_message("Missing required fields"));
        }
    };

    let contact_name = state
        .directory
        .find_by_phone(from)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| unknown_sender_name(from));

    info!("📨 SMS from {} ({})", contact_name, from);

    let record = NewUnifiedMessage {
        content: body_text.clone(),
        direction: Direction::Incoming,
        channel: ChannelKind::Sms,
        from_address: from.clone(),
        to_address: to.clone(),
        contact_name,
    };
    // Acknowledge even when persistence fails: a non-200 would make the
    // provider retry and redeliver.
    if let Err(e) = state.store.append(record).await {
        error!("Failed to store inbound SMS: {}", e);
    }

    Ok(twiml_message("Message received"))
}

async fn handle_email(state: Arc<AppState>, request: Request) -> anyhow::Result<Response> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| anyhow::anyhow!("Invalid multipart body: {}", e))?;

    let mut from = String::new();
    let mut to = String::new();
    let mut subject = String::new();
    let mut text = String::new();
    let mut html = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read multipart field: {}", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = field
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read field {}: {}", name, e))?;
        match name.as_str() {
            "from" => from = value,
            "to" => to = value,
            "subject" => subject = value,
            "text" => text = value,
            "html" => html = value,
            _ => {}
        }
    }

    let sender_address = extract_address(&from);
    let contact_name = state
        .directory
        .find_by_email(&sender_address)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| extract_sender_name(&from));

    let raw_content = if !text.trim().is_empty() {
        text
    } else {
        strip_html_tags(&html)
    };
    let content = clean_reply_content(&raw_content);
    if content.is_empty() {
        // Notification mails often clean down to nothing; acknowledge and
        // drop rather than store empty records.
        debug!(
            "Dropping contentless email from {} (subject: {})",
            sender_address, subject
        );
        return Ok(plain_text("Email ignored (no content)"));
    }

    info!("📧 Email from {} ({})", contact_name, sender_address);

    let record = NewUnifiedMessage {
        content,
        direction: Direction::Incoming,
        channel: ChannelKind::Email,
        from_address: sender_address,
        to_address: to,
        contact_name,
    };
    if let Err(e) = state.store.append(record).await {
        error!("Failed to store inbound email: {}", e);
    }

    Ok(plain_text("Email received"))
}
