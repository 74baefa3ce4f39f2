//! Channel adapter contract
//!
//! A channel is an external communication surface the gateway can deliver
//! messages to. Delivery is at-least-once with explicit failure reporting:
//! a failed attempt produces a [`DeliveryReceipt`] with `success: false`
//! rather than a silent retry.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one delivery attempt through a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Whether the channel accepted the message
    pub success: bool,

    /// Channel-assigned message id, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// When the attempt completed
    pub sent_at: DateTime<Utc>,

    /// Id of the channel that handled (or rejected) the attempt
    pub channel: String,

    /// Failure description, present when `success` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryReceipt {
    /// Receipt for a successful delivery.
    pub fn delivered(channel: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            sent_at: Utc::now(),
            channel: channel.into(),
            error: None,
        }
    }

    /// Receipt for a failed delivery attempt.
    pub fn failed(channel: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            sent_at: Utc::now(),
            channel: channel.into(),
            error: Some(error.into()),
        }
    }
}

/// Contract implemented by every channel transport.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Stable channel identifier used in routing payloads.
    fn id(&self) -> &str;

    /// Start the channel.
    async fn start(&self) -> Result<()>;

    /// Stop the channel.
    async fn stop(&self) -> Result<()>;

    /// Deliver `text` to `recipient_id`, with optional opaque extras.
    async fn send_message(
        &self,
        recipient_id: &str,
        text: &str,
        extras: Option<&serde_json::Value>,
    ) -> Result<DeliveryReceipt>;

    /// Channel status as a structured report.
    async fn health_check(&self) -> serde_json::Value;
}
