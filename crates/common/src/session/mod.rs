//! Conversation history storage
//!
//! History is read and replaced as a whole each turn, never merged.
//!
//! Provides:
//! - The `HistoryStore` trait
//! - Redis-backed storage with TTL
//! - In-memory storage for tests and single-process runs

use crate::config::SessionConfig;
use crate::errors::{AppError, Result};
use crate::llm::ChatMessage;
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Trait for per-session conversation history
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stored history, empty when the session is unknown
    async fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    /// Overwrite the stored history
    async fn replace(&self, session_id: &str, history: &[ChatMessage]) -> Result<()>;
}

/// Redis history store
pub struct RedisHistoryStore {
    connection: RwLock<MultiplexedConnection>,
    key_prefix: String,
    ttl_secs: u64,
}

impl RedisHistoryStore {
    /// Connect to Redis
    pub async fn connect(url: &str, config: &SessionConfig) -> Result<Self> {
        let client = Client::open(url).map_err(|e| AppError::CacheError {
            message: format!("Failed to create Redis client: {}", e),
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to connect to Redis: {}", e),
            })?;

        info!("Session store connected to Redis");

        Ok(Self {
            connection: RwLock::new(connection),
            key_prefix: config.key_prefix.clone(),
            ttl_secs: config.ttl_secs,
        })
    }

    /// Build a prefixed key
    fn key(&self, session_id: &str) -> String {
        format!("{}:chat_history:{}", self.key_prefix, session_id)
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let key = self.key(session_id);
        let mut conn = self.connection.write().await;

        let value: Option<String> = conn.get(&key).await.map_err(|e| AppError::CacheError {
            message: format!("Failed to get key '{}': {}", key, e),
        })?;

        match value {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => {
                debug!(key = %key, "No stored history");
                Ok(Vec::new())
            }
        }
    }

    async fn replace(&self, session_id: &str, history: &[ChatMessage]) -> Result<()> {
        let key = self.key(session_id);
        let json = serde_json::to_string(history)?;

        let mut conn = self.connection.write().await;
        let _: () = conn
            .set_ex(&key, &json, self.ttl_secs)
            .await
            .map_err(|e| AppError::CacheError {
                message: format!("Failed to set key '{}': {}", key, e),
            })?;

        debug!(key = %key, turns = history.len(), "History stored");
        Ok(())
    }
}

/// In-memory history store
#[derive(Default)]
pub struct MemoryHistoryStore {
    sessions: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace(&self, session_id: &str, history: &[ChatMessage]) -> Result<()> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), history.to_vec());
        Ok(())
    }
}

/// Create a history store based on configuration
pub async fn create_history_store(config: &SessionConfig) -> Result<Arc<dyn HistoryStore>> {
    match config.redis_url.as_deref() {
        Some(url) if !url.is_empty() => Ok(Arc::new(RedisHistoryStore::connect(url, config).await?)),
        _ => {
            info!("No Redis URL configured, keeping history in memory");
            Ok(Arc::new(MemoryHistoryStore::new()))
        }
    }
}
