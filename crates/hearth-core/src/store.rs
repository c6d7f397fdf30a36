//! Message persistence
//!
//! Append-only storage for unified message records behind the `MessageStore`
//! trait: an in-memory backend for tests and storage-less dev runs, and a
//! PostgreSQL backend using Diesel. Records are never mutated or deleted, so
//! concurrent appends from overlapping requests need no coordination beyond
//! the connection lock.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Mutex;
use uuid::Uuid;

use crate::channel::ChannelKind;
use crate::schema::messages;

/// Message direction, immutable once created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "incoming" => Ok(Direction::Incoming),
            "outgoing" => Ok(Direction::Outgoing),
            _ => Err(anyhow::anyhow!(
                "Invalid direction: {}. Must be 'incoming' or 'outgoing'",
                s
            )),
        }
    }
}

/// The single persisted record type for both directions on either channel
#[derive(Debug, Clone, Serialize)]
pub struct UnifiedMessage {
    pub id: Uuid,
    pub content: String,
    pub direction: Direction,
    pub channel: ChannelKind,
    pub from_address: String,
    pub to_address: String,
    pub contact_name: String,
    pub created_at: DateTime<Utc>,
}

/// A record to append; the store assigns the id and timestamp
#[derive(Debug, Clone)]
pub struct NewUnifiedMessage {
    pub content: String,
    pub direction: Direction,
    pub channel: ChannelKind,
    pub from_address: String,
    pub to_address: String,
    pub contact_name: String,
}

impl NewUnifiedMessage {
    fn into_message(self) -> UnifiedMessage {
        UnifiedMessage {
            id: Uuid::new_v4(),
            content: self.content,
            direction: self.direction,
            channel: self.channel,
            from_address: self.from_address,
            to_address: self.to_address,
            contact_name: self.contact_name,
            created_at: Utc::now(),
        }
    }
}

/// Append-only message persistence. Queries return most-recent-first.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: NewUnifiedMessage) -> Result<UnifiedMessage>;
    async fn list_recent(&self, limit: i64) -> Result<Vec<UnifiedMessage>>;
    async fn list_by_address(&self, address: &str, limit: i64) -> Result<Vec<UnifiedMessage>>;
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-memory store for tests and dev runs without a database
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<UnifiedMessage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: NewUnifiedMessage) -> Result<UnifiedMessage> {
        let message = message.into_message();
        let mut messages = self
            .messages
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        messages.push(message.clone());
        Ok(message)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<UnifiedMessage>> {
        let messages = self
            .messages
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(messages
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_by_address(&self, address: &str, limit: i64) -> Result<Vec<UnifiedMessage>> {
        let messages = self
            .messages
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(messages
            .iter()
            .rev()
            .filter(|m| m.from_address == address || m.to_address == address)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

// ============================================================================
// PostgreSQL backend
// ============================================================================

/// Message row from the database
#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = messages)]
struct MessageRow {
    pub id: Uuid,
    pub content: String,
    pub direction: String,
    pub channel: String,
    pub from_address: String,
    pub to_address: String,
    pub contact_name: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for UnifiedMessage {
    type Error = anyhow::Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(UnifiedMessage {
            id: row.id,
            content: row.content,
            direction: row.direction.parse()?,
            channel: row.channel.parse()?,
            from_address: row.from_address,
            to_address: row.to_address,
            contact_name: row.contact_name,
            created_at: row.created_at,
        })
    }
}

/// New message row to insert
#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessageRow<'a> {
    pub id: Uuid,
    pub content: &'a str,
    pub direction: &'a str,
    pub channel: &'a str,
    pub from_address: &'a str,
    pub to_address: &'a str,
    pub contact_name: &'a str,
    pub created_at: DateTime<Utc>,
}

/// PostgreSQL-backed store
pub struct PgMessageStore {
    conn: Mutex<PgConnection>,
}

impl PgMessageStore {
    pub fn connect(database_url: &str) -> Result<Self> {
        let conn = PgConnection::establish(database_url)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn rows_to_messages(rows: Vec<MessageRow>) -> Result<Vec<UnifiedMessage>> {
        rows.into_iter().map(UnifiedMessage::try_from).collect()
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, message: NewUnifiedMessage) -> Result<UnifiedMessage> {
        let message = message.into_message();
        let row = NewMessageRow {
            id: message.id,
            content: &message.content,
            direction: message.direction.as_str(),
            channel: message.channel.as_str(),
            from_address: &message.from_address,
            to_address: &message.to_address,
            contact_name: &message.contact_name,
            created_at: message.created_at,
        };

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        diesel::insert_into(messages::table)
            .values(&row)
            .execute(&mut *conn)?;

        Ok(message)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<UnifiedMessage>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let rows: Vec<MessageRow> = messages::table
            .order(messages::created_at.desc())
            .limit(limit)
            .select(MessageRow::as_select())
            .load(&mut *conn)?;

        Self::rows_to_messages(rows)
    }

    async fn list_by_address(&self, address: &str, limit: i64) -> Result<Vec<UnifiedMessage>> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;

        let rows: Vec<MessageRow> = messages::table
            .filter(
                messages::from_address
                    .eq(address)
                    .or(messages::to_address.eq(address)),
            )
            .order(messages::created_at.desc())
            .limit(limit)
            .select(MessageRow::as_select())
            .load(&mut *conn)?;

        Self::rows_to_messages(rows)
    }
}
