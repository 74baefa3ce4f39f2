//! Persisted record types
//!
//! An [`Interaction`] is one turn of conversation: a user input paired with
//! the system's output. A [`MemoryEntry`] is a durable fact, preference, or
//! experience with relevance metadata. Both are immutable once created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted turn of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Globally unique, immutable id
    pub id: String,

    /// Assigned at creation, never modified
    pub timestamp: DateTime<Utc>,

    /// Channel/topic the interaction came from
    pub source: String,

    /// User identifier
    pub user_id: String,

    /// User's input
    pub input_text: String,

    /// System/agent output
    pub output_text: String,

    /// Opaque key/value metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,

    /// Session the interaction belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Input form for [`Interaction`] creation.
///
/// Id and timestamp are assigned by the store when absent; empty source or
/// user_id fall back to `"unknown"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInteraction {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub input_text: String,
    #[serde(default)]
    pub output_text: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A durable fact/preference/experience with relevance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Globally unique, immutable id
    pub id: String,

    /// Assigned at creation
    pub timestamp: DateTime<Utc>,

    /// Free-form classification tag ('fact', 'preference', ...)
    pub category: String,

    /// Entry content
    pub content: String,

    /// Search tags
    pub tags: Vec<String>,

    /// Relevance score in [0.0, 1.0]; dominates recency in search ranking
    pub importance: f64,

    /// Once past, the entry is logically deleted even before cleanup runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    /// Whether the entry is logically deleted at instant `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }
}

/// Input form for [`MemoryEntry`] creation.
///
/// Importance defaults to 0.5; an empty category falls back to `"general"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMemoryEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub importance: Option<f64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry_with_expiry(expires_at: Option<DateTime<Utc>>) -> MemoryEntry {
        MemoryEntry {
            id: "mem-1".to_string(),
            timestamp: Utc::now(),
            category: "fact".to_string(),
            content: "water boils at 100C".to_string(),
            tags: vec!["physics".to_string()],
            importance: 0.5,
            expires_at,
        }
    }

    #[test]
    fn test_entry_without_expiry_never_expires() {
        let entry = entry_with_expiry(None);
        assert!(!entry.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_entry_past_expiry_is_expired() {
        let now = Utc::now();
        let entry = entry_with_expiry(Some(now - Duration::seconds(1)));
        assert!(entry.is_expired(now));
    }

    #[test]
    fn test_entry_at_exact_expiry_is_not_expired() {
        let now = Utc::now();
        let entry = entry_with_expiry(Some(now));
        // Expiry is strict: an entry expiring exactly now is still visible
        assert!(!entry.is_expired(now));
    }

    #[test]
    fn test_new_interaction_deserializes_from_sparse_json() {
        let new: NewInteraction = serde_json::from_str(
            r#"{"source": "telegram", "user_id": "u1", "input_text": "hi"}"#,
        )
        .unwrap();
        assert!(new.id.is_none());
        assert!(new.timestamp.is_none());
        assert_eq!(new.source, "telegram");
        assert_eq!(new.output_text, "");
    }

    #[test]
    fn test_interaction_serialization_skips_absent_options() {
        let interaction = Interaction {
            id: "int-1".to_string(),
            timestamp: Utc::now(),
            source: "mock".to_string(),
            user_id: "u1".to_string(),
            input_text: "hi".to_string(),
            output_text: "hello".to_string(),
            metadata: None,
            session_id: None,
        };
        let json = serde_json::to_string(&interaction).unwrap();
        assert!(!json.contains("metadata"));
        assert!(!json.contains("session_id"));
    }
}
