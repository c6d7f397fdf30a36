//! Hearth Core Library
//!
//! Shared types and modules for the Hearth family messaging relay.

pub mod api;
pub mod channel;
pub mod config;
pub mod contacts;
pub mod dispatch;
pub mod normalize;
pub mod prefs;
pub mod schema;
pub mod server;
pub mod signature;
pub mod store;
pub mod webhook;

// Re-export key types for convenience
pub use channel::{ChannelKind, ChannelSendResult, ChannelSender, EmailChannel, SmsChannel};
pub use config::Config;
pub use contacts::{Contact, ContactDirectory};
pub use dispatch::{DispatchError, Dispatcher};
pub use server::{router, AppState};
pub use store::{
    Direction, MemoryStore, MessageStore, NewUnifiedMessage, PgMessageStore, UnifiedMessage,
};
