//! Mock channel for testing and development
//!
//! Records every delivery in a bounded in-memory queue instead of calling
//! out to a real messaging platform. Used as the default transport until a
//! real adapter is wired in.

use super::adapter::{ChannelAdapter, DeliveryReceipt};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use tokio::sync::RwLock;

/// Queue length that triggers trimming.
const QUEUE_HIGH_WATER: usize = 100;

/// Queue length after a trim.
const QUEUE_LOW_WATER: usize = 50;

/// One message recorded by the mock channel.
#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
    pub id: String,
    pub recipient_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Value>,
}

/// In-memory channel that always accepts deliveries.
pub struct MockChannel {
    id: String,
    state: RwLock<MockState>,
}

#[derive(Default)]
struct MockState {
    running: bool,
    sent: VecDeque<SentMessage>,
    recipients: HashSet<String>,
}

impl MockChannel {
    /// Create a mock channel with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(MockState::default()),
        }
    }

    /// The most recent `limit` recorded messages, oldest first.
    pub async fn sent_messages(&self, limit: usize) -> Vec<SentMessage> {
        let state = self.state.read().await;
        state
            .sent
            .iter()
            .skip(state.sent.len().saturating_sub(limit))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn start(&self) -> Result<()> {
        self.state.write().await.running = true;
        tracing::info!(channel = %self.id, "Mock channel started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.state.write().await.running = false;
        tracing::info!(channel = %self.id, "Mock channel stopped");
        Ok(())
    }

    async fn send_message(
        &self,
        recipient_id: &str,
        text: &str,
        extras: Option<&serde_json::Value>,
    ) -> Result<DeliveryReceipt> {
        let mut state = self.state.write().await;
        if !state.running {
            return Err(Error::Channel(format!(
                "Mock channel {} is not running",
                self.id
            )));
        }

        let message = SentMessage {
            id: format!("mock-msg-{}", uuid::Uuid::new_v4()),
            recipient_id: recipient_id.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            extras: extras.cloned(),
        };

        state.recipients.insert(recipient_id.to_string());
        state.sent.push_back(message.clone());

        // Keep the queue size reasonable
        if state.sent.len() > QUEUE_HIGH_WATER {
            while state.sent.len() > QUEUE_LOW_WATER {
                state.sent.pop_front();
            }
        }

        tracing::debug!(
            channel = %self.id,
            recipient = recipient_id,
            "Mock channel recorded message"
        );

        Ok(DeliveryReceipt::delivered(&self.id, message.id))
    }

    async fn health_check(&self) -> serde_json::Value {
        let state = self.state.read().await;
        serde_json::json!({
            "status": "healthy",
            "channel_id": self.id,
            "is_running": state.running,
            "message_count": state.sent.len(),
            "recipients_count": state.recipients.len(),
            "timestamp": Utc::now(),
        })
    }
}
