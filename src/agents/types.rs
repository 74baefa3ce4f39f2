//! Agent contract and the built-in responder
//!
//! An agent turns an inbound routing payload into a reply. The built-in
//! [`EchoAgent`] is a placeholder response generator with a handful of
//! canned keyword replies; a real deployment swaps in an LLM-backed
//! implementation behind the same trait.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reply produced by an agent for one inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    /// Id of the agent that produced the reply
    pub agent_id: String,

    /// Response text
    pub response_text: String,

    /// When the reply was produced
    pub timestamp: DateTime<Utc>,

    /// The payload the reply answers, carried verbatim
    pub original_request: serde_json::Value,
}

/// Contract implemented by every responder.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Stable agent identifier.
    fn id(&self) -> &str;

    /// Process an inbound payload and produce a reply.
    async fn process_message(&self, payload: &serde_json::Value) -> Result<AgentReply>;

    /// Agent status as a structured report.
    async fn health_check(&self) -> serde_json::Value {
        serde_json::json!({
            "agent_id": self.id(),
            "status": "healthy",
            "timestamp": Utc::now(),
        })
    }
}

/// Built-in keyword responder.
pub struct EchoAgent {
    id: String,
    model: String,
}

impl EchoAgent {
    /// Create an echo agent with the given id and reported model name.
    pub fn new(id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
        }
    }

    fn respond(&self, input: &str) -> String {
        let lower = input.to_lowercase();

        if lower.contains("hello") || lower.contains("hi") || lower.contains("hey") {
            "Hello there! How can I assist you today?".to_string()
        } else if lower.contains("help") {
            "I'm an assistant agent. Ask me anything and I'll do my best to respond.".to_string()
        } else if lower.contains("time") || lower.contains("date") {
            format!(
                "The current time is {} UTC.",
                Utc::now().format("%Y-%m-%d %H:%M:%S")
            )
        } else if lower.contains("name") {
            format!("I'm an agent running with id {}.", self.id)
        } else {
            format!(
                "I received your message: '{}'. What would you like me to help you with?",
                input
            )
        }
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn id(&self) -> &str {
        &self.id
    }

    async fn process_message(&self, payload: &serde_json::Value) -> Result<AgentReply> {
        let content = payload
            .get("content")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("");
        let channel = payload
            .get("channel")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");
        let user_id = payload
            .get("user_id")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown");

        tracing::debug!(
            agent = %self.id,
            channel,
            user_id,
            "Processing message"
        );

        Ok(AgentReply {
            agent_id: self.id.clone(),
            response_text: self.respond(content),
            timestamp: Utc::now(),
            original_request: payload.clone(),
        })
    }

    async fn health_check(&self) -> serde_json::Value {
        serde_json::json!({
            "agent_id": self.id,
            "status": "healthy",
            "model": self.model,
            "timestamp": Utc::now(),
        })
    }
}
