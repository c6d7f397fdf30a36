//! Authenticated HTTP API consumed by the web UI
//!
//! Outbound send, message history, per-contact counts, and per-user
//! preferences. Unlike the provider-facing webhook, these endpoints return
//! real status codes and structured JSON errors.

use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

use crate::channel::ChannelSendResult;
use crate::normalize::is_known_sender;
use crate::prefs::Preferences;
use crate::server::AppState;
use crate::store::UnifiedMessage;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
/// How far back the summary counts look
const SUMMARY_SCAN_LIMIT: i64 = 500;

fn internal_error(e: anyhow::Error) -> Response {
    error!("API request failed: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "internal error"})),
    )
        .into_response()
}

/// Bearer-token gate for the /api routes. Left open when no token is
/// configured (dev).
pub async fn require_api_token(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(expected) = &state.config.api_token {
        let authorized = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| token == expected)
            .unwrap_or(false);
        if !authorized {
            warn!("Rejected API request without a valid token");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "unauthorized"})),
            )
                .into_response();
        }
    }
    next.run(request).await
}

#[derive(Deserialize)]
pub struct SendRequest {
    /// Contact name (case-insensitive) or id
    pub contact: String,
    pub body: String,
    /// Display name of the family member composing the message
    pub sender: String,
}

#[derive(Serialize)]
pub struct SendResponse {
    /// True when at least one channel succeeded; the per-channel results
    /// are authoritative and keep partial success visible
    pub overall_success: bool,
    pub results: Vec<ChannelSendResult>,
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendRequest>,
) -> Response {
    let contact = match state
        .directory
        .find_by_name(&request.contact)
        .or_else(|| state.directory.find_by_id(&request.contact))
    {
        Some(contact) => contact,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("unknown contact: {}", request.contact)})),
            )
                .into_response();
        }
    };

    match state
        .dispatcher
        .dispatch(contact, &request.body, &request.sender)
        .await
    {
        Ok(results) => {
            let overall_success = results.iter().any(|r| r.success);
            (
                StatusCode::OK,
                Json(SendResponse {
                    overall_success,
                    results,
                }),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
    /// Filter out messages whose sender the directory does not know
    #[serde(default)]
    pub known_only: bool,
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state
        .store
        .list_recent(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await
    {
        Ok(messages) => Json(filter_known(messages, &state, query.known_only)).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn list_messages_for_address(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state
        .store
        .list_by_address(&address, query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await
    {
        Ok(messages) => Json(filter_known(messages, &state, query.known_only)).into_response(),
        Err(e) => internal_error(e),
    }
}

fn filter_known(
    messages: Vec<UnifiedMessage>,
    state: &AppState,
    known_only: bool,
) -> Vec<UnifiedMessage> {
    if !known_only {
        return messages;
    }
    messages
        .into_iter()
        .filter(|m| is_known_sender(m, &state.directory))
        .collect()
}

#[derive(Serialize)]
pub struct ContactSummary {
    pub name: String,
    pub emoji: Option<String>,
    pub message_count: usize,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub contacts: Vec<ContactSummary>,
    /// Messages whose sender the directory does not know
    pub unknown_count: usize,
}

pub async fn contact_summary(State(state): State<Arc<AppState>>) -> Response {
    let messages = match state.store.list_recent(SUMMARY_SCAN_LIMIT).await {
        Ok(messages) => messages,
        Err(e) => return internal_error(e),
    };

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut unknown_count = 0;
    for message in &messages {
        if is_known_sender(message, &state.directory) {
            *counts.entry(message.contact_name.as_str()).or_default() += 1;
        } else {
            unknown_count += 1;
        }
    }

    let contacts = state
        .directory
        .contacts()
        .iter()
        .map(|c| ContactSummary {
            name: c.name.clone(),
            emoji: c.emoji.clone(),
            message_count: counts.get(c.name.as_str()).copied().unwrap_or(0),
        })
        .collect();

    Json(SummaryResponse {
        contacts,
        unknown_count,
    })
    .into_response()
}

pub async fn get_prefs(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Response {
    match state.prefs.get(&user_id).await {
        Ok(prefs) => Json(prefs).into_response(),
        Err(e) => internal_error(e),
    }
}

pub async fn put_prefs(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(values): Json<Preferences>,
) -> Response {
    match state.prefs.merge(&user_id, values).await {
        Ok(merged) => Json(merged).into_response(),
        Err(e) => internal_error(e),
    }
}
