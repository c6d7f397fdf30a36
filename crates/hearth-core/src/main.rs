use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth_core::channel::{ChannelSender, EmailChannel, SmsChannel};
use hearth_core::config::Config;
use hearth_core::contacts::ContactDirectory;
use hearth_core::dispatch::Dispatcher;
use hearth_core::prefs::{MemoryPrefs, PreferenceStore, RedisPrefs};
use hearth_core::server::{router, AppState};
use hearth_core::store::{MemoryStore, MessageStore, PgMessageStore};
use hearth_providers::{SendGridClient, TwilioClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "hearth=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🏠 Hearth starting up...");

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Configuration loaded");
    info!("  Environment: {:?}", config.app_env);
    info!("  Contacts: {}", config.contacts_path);

    // Contact directory (read-only at runtime)
    let directory = ContactDirectory::load(std::path::Path::new(&config.contacts_path))?;
    if directory.is_empty() {
        warn!("⚠️  Contact directory is empty - every inbound sender will be unknown");
    } else {
        info!("Loaded {} contacts", directory.contacts().len());
    }

    // Message store
    let store: Arc<dyn MessageStore> = match &config.database_url {
        Some(database_url) => {
            // Run database migrations first
            {
                use diesel::prelude::*;
                use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
                pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

                let mut conn = diesel::PgConnection::establish(database_url)?;
                conn.run_pending_migrations(MIGRATIONS)
                    .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
                info!("Database migrations applied");
            }
            info!("Message store: postgres");
            Arc::new(PgMessageStore::connect(database_url)?)
        }
        None => {
            warn!("DATABASE_URL not set - message history will not survive restarts");
            Arc::new(MemoryStore::new())
        }
    };

    // Preference store
    let prefs: Arc<dyn PreferenceStore> = match &config.redis_url {
        Some(redis_url) => {
            let prefs = RedisPrefs::connect(redis_url).await?;
            info!("Preference store: redis");
            Arc::new(prefs)
        }
        None => {
            info!("Preference store: in-memory");
            Arc::new(MemoryPrefs::new())
        }
    };

    // Outbound channel senders
    let mut senders: Vec<Arc<dyn ChannelSender>> = Vec::new();
    match (
        &config.twilio_account_sid,
        &config.twilio_auth_token,
        &config.twilio_from_number,
    ) {
        (Some(sid), Some(token), Some(from)) => {
            let client = TwilioClient::new(sid.clone(), token.clone())?;
            senders.push(Arc::new(SmsChannel::new(client, from.clone())));
            info!("SMS channel enabled (from {})", from);
        }
        _ => warn!("Twilio credentials not fully set - SMS channel disabled"),
    }
    match (&config.sendgrid_api_key, &config.sendgrid_from_email) {
        (Some(api_key), Some(from)) => {
            let client = SendGridClient::new(api_key.clone())?;
            senders.push(Arc::new(EmailChannel::new(
                client,
                from.clone(),
                config.email_subject.clone(),
            )));
            info!("Email channel enabled (from {})", from);
        }
        _ => warn!("SendGrid credentials not fully set - email channel disabled"),
    }

    // Inbound webhook verification posture
    if config.twilio_auth_token.is_some() {
        if config.twilio_enforce_signature {
            info!("SMS webhook signature verification: enforced");
        } else {
            warn!("⚠️  SMS webhook signature verification is log-only (fail-open)");
        }
    } else {
        warn!("TWILIO_AUTH_TOKEN not set - SMS webhook signatures will not be verified");
    }

    let dispatcher = Dispatcher::new(
        senders,
        store.clone(),
        Duration::from_secs(config.channel_timeout_secs),
    );

    let http_port = config.http_port;
    let state = Arc::new(AppState {
        config,
        directory,
        store,
        prefs,
        dispatcher,
    });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", http_port)).await?;
    info!("🏠 Hearth is listening on port {}", http_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down...");
        })
        .await?;

    info!("🏠 Hearth has shut down.");

    Ok(())
}
