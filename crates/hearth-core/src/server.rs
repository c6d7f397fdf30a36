//! HTTP server wiring
//!
//! Shared application state and the router: the open provider webhook, the
//! token-gated API, and a health check.

use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::contacts::ContactDirectory;
use crate::dispatch::Dispatcher;
use crate::prefs::PreferenceStore;
use crate::store::MessageStore;
use crate::webhook;

pub struct AppState {
    pub config: Config,
    pub directory: ContactDirectory,
    pub store: Arc<dyn MessageStore>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub dispatcher: Dispatcher,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint - returns 200 OK when the service is running
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/send", post(api::send_message))
        .route("/messages", get(api::list_messages))
        .route("/messages/{address}", get(api::list_messages_for_address))
        .route("/contacts/summary", get(api::contact_summary))
        .route(
            "/prefs/{user_id}",
            get(api::get_prefs).put(api::put_prefs),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_api_token,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/webhook", post(webhook::inbound_webhook))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
