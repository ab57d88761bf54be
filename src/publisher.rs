//! Message channel publishers.
//!
//! The request handler only sees the [`Publisher`] trait. Three implementations
//! ship with the crate: a Redis stream publisher for deployments, a logging one
//! that retains nothing for local runs without Redis, and an in-memory one for
//! tests.

use crate::error::PublishError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::sync::{Arc, Mutex};

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `payload` to `destination`, returning the channel's message id.
    async fn publish(&self, destination: &str, payload: Vec<u8>) -> Result<String, PublishError>;
}

/// Appends events to a Redis stream named after the destination.
///
/// The stream entry id returned by `XADD` is used as the event id. The
/// connection manager re-establishes a dropped connection on the next
/// command, so a Redis restart only fails the requests issued while it is down.
#[derive(Clone)]
pub struct RedisPublisher {
    connection: ConnectionManager,
}

impl RedisPublisher {
    pub async fn connect(redis_url: &str) -> Result<Self, PublishError> {
        let client = Client::open(redis_url)
            .map_err(|e| PublishError::Unavailable(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| PublishError::Unavailable(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection })
    }

    pub async fn ping(&self) -> Result<(), PublishError> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl Publisher for RedisPublisher {
    async fn publish(&self, destination: &str, payload: Vec<u8>) -> Result<String, PublishError> {
        let mut conn = self.connection.clone();

        let entry_id: String = redis::cmd("XADD")
            .arg(destination)
            .arg("*")
            .arg("event")
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        Ok(entry_id)
    }
}

/// Logs each event and discards it, handing out UUID ids.
///
/// Used when no Redis URL is configured. Nothing is retained, so memory stays
/// flat however long the process runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, destination: &str, payload: Vec<u8>) -> Result<String, PublishError> {
        let id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            target: "event_gate::publisher",
            event_id = %id,
            destination,
            bytes = payload.len(),
            "Event accepted without a message channel"
        );
        tracing::debug!(
            target: "event_gate::publisher",
            event_id = %id,
            payload = %String::from_utf8_lossy(&payload),
            "Discarded event payload"
        );
        Ok(id)
    }
}

/// A message captured by [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub id: String,
    pub destination: String,
    pub payload: Vec<u8>,
}

/// Keeps every published message in memory and hands out UUID ids.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    messages: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, destination: &str, payload: Vec<u8>) -> Result<String, PublishError> {
        let id = uuid::Uuid::new_v4().to_string();

        let mut messages = self
            .messages
            .lock()
            .map_err(|_| PublishError::Backend("in-memory channel lock poisoned".to_string()))?;
        messages.push(PublishedMessage {
            id: id.clone(),
            destination: destination.to_string(),
            payload,
        });

        Ok(id)
    }
}
