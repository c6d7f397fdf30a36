//! Per-user preference storage
//!
//! Small key-value state for the web UI (theme, display settings), behind an
//! injected trait instead of a module-level map: in-memory for tests and dev
//! runs, Redis for durable deployments.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;

pub type Preferences = Map<String, Value>;

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Preferences>;

    /// Merge the given keys into the user's preferences and return the
    /// merged result. Last writer wins per key.
    async fn merge(&self, user_id: &str, values: Preferences) -> Result<Preferences>;
}

/// In-memory preference store
#[derive(Default)]
pub struct MemoryPrefs {
    prefs: Mutex<HashMap<String, Preferences>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPrefs {
    async fn get(&self, user_id: &str) -> Result<Preferences> {
        let prefs = self
            .prefs
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(prefs.get(user_id).cloned().unwrap_or_default())
    }

    async fn merge(&self, user_id: &str, values: Preferences) -> Result<Preferences> {
        let mut prefs = self
            .prefs
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let entry = prefs.entry(user_id.to_string()).or_default();
        for (key, value) in values {
            entry.insert(key, value);
        }
        Ok(entry.clone())
    }
}

/// Redis-backed preference store: one JSON blob per user key
pub struct RedisPrefs {
    conn: redis::aio::MultiplexedConnection,
}

impl RedisPrefs {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    fn key(user_id: &str) -> String {
        format!("hearth:prefs:{}", user_id)
    }
}

#[async_trait]
impl PreferenceStore for RedisPrefs {
    async fn get(&self, user_id: &str) -> Result<Preferences> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(user_id)).await?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Preferences::new()),
        }
    }

    async fn merge(&self, user_id: &str, values: Preferences) -> Result<Preferences> {
        let mut merged = self.get(user_id).await?;
        for (key, value) in values {
            merged.insert(key, value);
        }
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(Self::key(user_id), serde_json::to_string(&merged)?)
            .await?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_prefs_get_default() {
        let prefs = MemoryPrefs::new();
        assert!(prefs.get("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_prefs_merge() {
        let prefs = MemoryPrefs::new();

        let mut first = Preferences::new();
        first.insert("theme".to_string(), json!("dark"));
        first.insert("emoji".to_string(), json!("🦀"));
        prefs.merge("jane", first).await.unwrap();

        let mut second = Preferences::new();
        second.insert("theme".to_string(), json!("light"));
        let merged = prefs.merge("jane", second).await.unwrap();

        assert_eq!(merged["theme"], json!("light"));
        assert_eq!(merged["emoji"], json!("🦀"));

        // Other users are unaffected
        assert!(prefs.get("joe").await.unwrap().is_empty());
    }
}
