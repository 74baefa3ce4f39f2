//! Event bus types
//!
//! Topics are plain strings so the topic set stays extensible; the four
//! built-in lifecycle topics are provided as constants.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Emitted before a route handler runs.
pub const MESSAGE_RECEIVED: &str = "message_received";

/// Emitted after a route handler completes successfully.
pub const MESSAGE_PROCESSED: &str = "message_processed";

/// Emitted when an agent response is delivered to a channel.
pub const AGENT_RESPONSE: &str = "agent_response";

/// Emitted when routing or handler execution fails.
pub const ERROR_OCCURRED: &str = "error_occurred";

/// A single event delivered to observers.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Topic the event was published on
    pub topic: String,

    /// Topic-specific event data
    pub data: serde_json::Value,

    /// When the event was emitted
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Create a record for `topic` stamped with the current time.
    pub fn new(topic: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            topic: topic.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Handle identifying one observer registration.
///
/// Closures have no notion of equality, so removal goes through the id
/// handed back at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub(crate) u64);

/// Observer callback invoked synchronously for each event on its topic.
///
/// A returned error is logged by the bus and never propagated.
pub type Observer = Arc<dyn Fn(&EventRecord) -> crate::Result<()> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_record_carries_topic_and_data() {
        let record = EventRecord::new(MESSAGE_RECEIVED, serde_json::json!({"source": "channel"}));
        assert_eq!(record.topic, "message_received");
        assert_eq!(record.data["source"], "channel");
    }

    #[test]
    fn test_event_record_serializes() {
        let record = EventRecord::new(ERROR_OCCURRED, serde_json::json!({"error": "boom"}));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"topic\":\"error_occurred\""));
        assert!(json.contains("boom"));
    }
}
