//! Agent registry and selection policy
//!
//! [`AgentManager`] resolves agents by id and tracks the configured default.
//! [`AgentSelector`] is the pluggable selection policy; the built-in
//! [`DefaultAgentSelector`] always picks the default agent — explicitly a
//! placeholder strategy, kept behind a trait so content- or load-based
//! selection can replace it without touching the gateway.

use super::types::Agent;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry of agents keyed by agent id.
pub struct AgentManager {
    agents: RwLock<HashMap<String, Arc<dyn Agent>>>,
    default_agent_id: RwLock<Option<String>>,
}

impl AgentManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            default_agent_id: RwLock::new(None),
        }
    }

    /// Create a registry with `agent` registered as the default.
    pub async fn with_default(agent: Arc<dyn Agent>) -> Self {
        let manager = Self::new();
        let id = agent.id().to_string();
        manager.register(agent).await;
        manager.set_default(&id).await;
        manager
    }

    /// Register an agent under its id.
    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let id = agent.id().to_string();
        self.agents.write().await.insert(id.clone(), agent);
        tracing::info!(agent = %id, "Registered agent");
    }

    /// Mark an agent id as the default used by the built-in selector.
    pub async fn set_default(&self, agent_id: &str) {
        *self.default_agent_id.write().await = Some(agent_id.to_string());
    }

    /// Resolve an agent by id.
    pub async fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// The configured default agent id, if any.
    pub async fn default_agent_id(&self) -> Option<String> {
        self.default_agent_id.read().await.clone()
    }

    /// All registered agent ids.
    pub async fn list(&self) -> Vec<String> {
        self.agents.read().await.keys().cloned().collect()
    }

    /// Remove an agent. Returns whether it was registered.
    pub async fn remove(&self, agent_id: &str) -> bool {
        let removed = self.agents.write().await.remove(agent_id).is_some();
        if removed {
            let mut default = self.default_agent_id.write().await;
            if default.as_deref() == Some(agent_id) {
                *default = None;
            }
            tracing::info!(agent = agent_id, "Removed agent");
        }
        removed
    }

    /// Aggregated status report over all registered agents.
    pub async fn health_check(&self) -> serde_json::Value {
        let agents: Vec<Arc<dyn Agent>> = self.agents.read().await.values().cloned().collect();

        let mut statuses = serde_json::Map::new();
        for agent in &agents {
            statuses.insert(agent.id().to_string(), agent.health_check().await);
        }

        serde_json::json!({
            "status": "healthy",
            "agent_count": agents.len(),
            "default_agent": self.default_agent_id().await,
            "agents": statuses,
            "timestamp": Utc::now(),
        })
    }
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Pluggable policy choosing which agent handles an inbound payload.
#[async_trait]
pub trait AgentSelector: Send + Sync {
    /// Return the id of the agent that should handle `payload`, or `None`
    /// when no agent is suitable.
    async fn select(&self, payload: &serde_json::Value, agents: &AgentManager) -> Option<String>;
}

/// Selection policy that always returns the configured default agent.
pub struct DefaultAgentSelector;

#[async_trait]
impl AgentSelector for DefaultAgentSelector {
    async fn select(&self, _payload: &serde_json::Value, agents: &AgentManager) -> Option<String> {
        agents.default_agent_id().await
    }
}
