//! Channel registry and delivery entry point
//!
//! Resolves channel adapters by id and extracts recipient/text from routing
//! payloads. An unknown channel id yields a failure receipt rather than an
//! error: the gateway reports the failed attempt instead of aborting the
//! route.

use super::adapter::{ChannelAdapter, DeliveryReceipt};
use crate::error::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry of channel adapters keyed by channel id.
pub struct ChannelManager {
    channels: RwLock<HashMap<String, Arc<dyn ChannelAdapter>>>,
}

impl ChannelManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Register a channel adapter under its id.
    pub async fn register(&self, channel: Arc<dyn ChannelAdapter>) {
        let id = channel.id().to_string();
        self.channels.write().await.insert(id.clone(), channel);
        tracing::info!(channel = %id, "Registered channel");
    }

    /// Resolve a channel by id.
    pub async fn get(&self, channel_id: &str) -> Option<Arc<dyn ChannelAdapter>> {
        self.channels.read().await.get(channel_id).cloned()
    }

    /// All registered channel ids.
    pub async fn list(&self) -> Vec<String> {
        self.channels.read().await.keys().cloned().collect()
    }

    /// Deliver a routing payload through the named channel.
    ///
    /// Recipient and text are extracted permissively: `recipient_id` falls
    /// back to `user_id`, `text` to `message`. An unknown channel produces a
    /// failure receipt; adapter errors propagate to the caller.
    pub async fn send_message(
        &self,
        channel_id: &str,
        payload: &serde_json::Value,
    ) -> Result<DeliveryReceipt> {
        let Some(channel) = self.get(channel_id).await else {
            tracing::error!(channel = channel_id, "Channel not found");
            return Ok(DeliveryReceipt::failed(
                channel_id,
                format!("Channel {} not found", channel_id),
            ));
        };

        let recipient_id = payload
            .get("recipient_id")
            .and_then(serde_json::Value::as_str)
            .or_else(|| payload.get("user_id").and_then(serde_json::Value::as_str))
            .unwrap_or("unknown");
        let text = payload
            .get("text")
            .and_then(serde_json::Value::as_str)
            .or_else(|| payload.get("message").and_then(serde_json::Value::as_str))
            .unwrap_or("");

        channel.send_message(recipient_id, text, Some(payload)).await
    }

    /// Start every registered channel concurrently, logging individual
    /// failures.
    pub async fn start_all(&self) {
        let channels: Vec<Arc<dyn ChannelAdapter>> =
            self.channels.read().await.values().cloned().collect();
        let results = futures::future::join_all(channels.iter().map(|c| c.start())).await;
        for (channel, result) in channels.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(channel = channel.id(), "Failed to start channel: {}", e);
            }
        }
        tracing::info!("All channels started");
    }

    /// Stop every registered channel concurrently, logging individual
    /// failures.
    pub async fn stop_all(&self) {
        let channels: Vec<Arc<dyn ChannelAdapter>> =
            self.channels.read().await.values().cloned().collect();
        let results = futures::future::join_all(channels.iter().map(|c| c.stop())).await;
        for (channel, result) in channels.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(channel = channel.id(), "Failed to stop channel: {}", e);
            }
        }
        tracing::info!("All channels stopped");
    }

    /// Aggregated status report over all registered channels.
    pub async fn health_check(&self) -> serde_json::Value {
        let channels: Vec<Arc<dyn ChannelAdapter>> =
            self.channels.read().await.values().cloned().collect();

        let mut statuses = serde_json::Map::new();
        for channel in &channels {
            statuses.insert(channel.id().to_string(), channel.health_check().await);
        }

        serde_json::json!({
            "status": "healthy",
            "channel_count": channels.len(),
            "channels": statuses,
            "timestamp": Utc::now(),
        })
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
