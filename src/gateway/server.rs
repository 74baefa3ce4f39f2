//! Gateway implementation
//!
//! The gateway orchestrates routing: it resolves the handler for a
//! `(source, destination)` pair, invokes it, persists the resulting
//! interaction, and emits lifecycle events before and after. Component
//! references are injected at `initialize` — there is no process-wide
//! singleton.
//!
//! Lifecycle: `Uninitialized → Initialized → Running`, with a terminal
//! `Stopped` reachable from `Running` or `Initialized`. Routing is only
//! valid while `Running`.

use crate::agents::{AgentManager, AgentSelector, DefaultAgentSelector};
use crate::channels::ChannelManager;
use crate::config::RelaybotConfig;
use crate::error::{Error, Result};
use crate::events::{
    EventBus, Observer, ObserverId, AGENT_RESPONSE, ERROR_OCCURRED, MESSAGE_PROCESSED,
    MESSAGE_RECEIVED,
};
use crate::gateway::routing::{InternalMessageKind, RouteKey, RouteOutcome};
use crate::memory::{MemoryStore, NewInteraction};
use chrono::Utc;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Gateway lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    /// Created, components not yet injected
    Uninitialized,
    /// Components injected, not yet accepting routes
    Initialized,
    /// Accepting routes
    Running,
    /// Terminal
    Stopped,
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Component references injected at `initialize`.
#[derive(Clone)]
struct Components {
    agents: Arc<AgentManager>,
    channels: Arc<ChannelManager>,
    memory: Option<Arc<MemoryStore>>,
}

/// Message gateway: routing, lifecycle events, and orchestration.
pub struct Gateway {
    config: RelaybotConfig,
    state: RwLock<GatewayState>,
    events: EventBus,
    components: RwLock<Option<Components>>,
    selector: RwLock<Arc<dyn AgentSelector>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Create a gateway in the `Uninitialized` state.
    pub fn new(config: RelaybotConfig) -> Self {
        Self {
            config,
            state: RwLock::new(GatewayState::Uninitialized),
            events: EventBus::new(),
            components: RwLock::new(None),
            selector: RwLock::new(Arc::new(DefaultAgentSelector)),
            cleanup_task: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> GatewayState {
        *self.state.read().await
    }

    /// Inject component references. Valid only from `Uninitialized`.
    ///
    /// The gateway holds references, not ownership: the same managers and
    /// store may be shared with an API layer or other callers.
    pub async fn initialize(
        &self,
        agents: Arc<AgentManager>,
        channels: Arc<ChannelManager>,
        memory: Option<Arc<MemoryStore>>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != GatewayState::Uninitialized {
            return Err(Error::not_running("initialize", *state));
        }

        tracing::info!("Initializing gateway");
        *self.components.write().await = Some(Components {
            agents,
            channels,
            memory,
        });
        *state = GatewayState::Initialized;

        tracing::info!("Gateway initialized");
        Ok(())
    }

    /// Replace the agent selection policy.
    pub async fn set_agent_selector(&self, selector: Arc<dyn AgentSelector>) {
        *self.selector.write().await = selector;
    }

    /// Start accepting routes. Valid only from `Initialized`.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != GatewayState::Initialized {
            return Err(Error::not_running("start", *state));
        }

        tracing::info!("Starting gateway");

        let components = self.components.read().await.clone();
        if let Some(components) = &components {
            components.channels.start_all().await;

            if let Some(memory) = &components.memory {
                let interval = self.config.memory.cleanup_interval_secs;
                if interval > 0 {
                    *self.cleanup_task.lock().await =
                        Some(spawn_cleanup_task(memory.clone(), interval));
                }
            }
        }

        *state = GatewayState::Running;
        tracing::info!("Gateway started");
        Ok(())
    }

    /// Stop the gateway. Valid from `Running` or `Initialized`; calling it
    /// again once `Stopped` is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut state = self.state.write().await;
        match *state {
            GatewayState::Running | GatewayState::Initialized => {}
            GatewayState::Stopped => return Ok(()),
            GatewayState::Uninitialized => {
                return Err(Error::not_running("stop", *state));
            }
        }

        tracing::info!("Stopping gateway");

        if let Some(task) = self.cleanup_task.lock().await.take() {
            task.abort();
        }
        if let Some(components) = self.components.read().await.clone() {
            components.channels.stop_all().await;
        }

        *state = GatewayState::Stopped;
        tracing::info!("Gateway stopped");
        Ok(())
    }

    /// Register an observer on an event topic, creating the topic if needed.
    pub async fn register_event_handler(&self, topic: &str, observer: Observer) -> ObserverId {
        self.events.register(topic, observer).await
    }

    /// Remove an event observer; removing an unknown registration is a
    /// silent no-op.
    pub async fn remove_event_handler(&self, topic: &str, id: ObserverId) {
        self.events.remove(topic, id).await;
    }

    /// Route a message from `source` to `destination`.
    ///
    /// Valid only while `Running`. An unregistered pair returns
    /// [`RouteOutcome::NotRouted`]; handler failures propagate as
    /// [`Error::Routing`].
    pub async fn route_message(
        &self,
        source: &str,
        destination: &str,
        payload: Value,
    ) -> Result<RouteOutcome> {
        self.route_inner(source, destination, payload, None).await
    }

    /// Route a message with the handler bounded by `timeout`.
    ///
    /// A handler that exceeds the bound surfaces [`Error::Timeout`] after
    /// an `error_occurred` event.
    pub async fn route_message_with_timeout(
        &self,
        source: &str,
        destination: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<RouteOutcome> {
        self.route_inner(source, destination, payload, Some(timeout))
            .await
    }

    async fn route_inner(
        &self,
        source: &str,
        destination: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<RouteOutcome> {
        {
            let state = self.state.read().await;
            if *state != GatewayState::Running {
                return Err(Error::not_running("route_message", *state));
            }
        }

        let Some(key) = RouteKey::parse(source, destination) else {
            tracing::warn!(source, destination, "No route found for pair");
            return Ok(RouteOutcome::NotRouted);
        };

        let components = self
            .components
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::not_running("route_message", GatewayState::Uninitialized))?;

        self.events
            .emit(
                MESSAGE_RECEIVED,
                json!({
                    "source": source,
                    "destination": destination,
                    "payload": payload.clone(),
                }),
            )
            .await;

        let result = match timeout {
            Some(bound) => {
                match tokio::time::timeout(bound, self.dispatch(key, &payload, &components)).await
                {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::error!(route = %key, "Handler exceeded {:?}", bound);
                        self.events
                            .emit(
                                ERROR_OCCURRED,
                                json!({
                                    "error": format!("handler exceeded {:?}", bound),
                                    "context": key.as_str(),
                                }),
                            )
                            .await;
                        return Err(Error::Timeout(bound));
                    }
                }
            }
            None => self.dispatch(key, &payload, &components).await,
        };

        match result {
            Ok(outcome) => {
                self.events
                    .emit(
                        MESSAGE_PROCESSED,
                        json!({
                            "source": source,
                            "destination": destination,
                            "payload": payload,
                            "result": outcome.value(),
                        }),
                    )
                    .await;
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(route = %key, "Error routing message: {}", e);
                self.events
                    .emit(
                        ERROR_OCCURRED,
                        json!({
                            "error": e.to_string(),
                            "context": key.as_str(),
                        }),
                    )
                    .await;
                Err(Error::routing(key.as_str(), e))
            }
        }
    }

    async fn dispatch(
        &self,
        key: RouteKey,
        payload: &Value,
        components: &Components,
    ) -> Result<RouteOutcome> {
        match key {
            RouteKey::ChannelToAgent => self.handle_channel_to_agent(payload, components).await,
            RouteKey::AgentToChannel => self.handle_agent_to_channel(payload, components).await,
            RouteKey::Internal => self.handle_internal(payload).await,
        }
    }

    /// Inbound message: select an agent, let it respond, persist the
    /// exchange.
    async fn handle_channel_to_agent(
        &self,
        payload: &Value,
        components: &Components,
    ) -> Result<RouteOutcome> {
        let selector = self.selector.read().await.clone();
        let Some(agent_id) = selector.select(payload, &components.agents).await else {
            tracing::warn!("No suitable agent found for message");
            return Ok(RouteOutcome::NotRouted);
        };

        let Some(agent) = components.agents.get(&agent_id).await else {
            tracing::warn!(agent = %agent_id, "Selected agent is not registered");
            return Ok(RouteOutcome::NotRouted);
        };

        let reply = agent.process_message(payload).await?;

        if let Some(memory) = &components.memory {
            let new = NewInteraction {
                source: payload
                    .get("channel")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                user_id: payload
                    .get("user_id")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                input_text: payload
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                output_text: reply.response_text.clone(),
                metadata: Some(json!({
                    "type": "channel_to_agent",
                    "agent_id": agent_id,
                })),
                session_id: payload
                    .get("session_id")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                ..Default::default()
            };

            // Delivery of the response takes precedence over persistence:
            // a failed insert is logged, never unwound into the route result.
            if let Err(e) = memory.store_interaction(new).await {
                tracing::error!("Failed to persist routed interaction: {}", e);
            }
        }

        Ok(RouteOutcome::Completed(serde_json::to_value(reply)?))
    }

    /// Outbound response: deliver through the named channel and announce
    /// the outcome.
    async fn handle_agent_to_channel(
        &self,
        payload: &Value,
        components: &Components,
    ) -> Result<RouteOutcome> {
        let Some(channel_id) = payload.get("channel_id").and_then(Value::as_str) else {
            tracing::warn!("No channel_id specified for agent to channel routing");
            return Ok(RouteOutcome::NotRouted);
        };

        let receipt = components.channels.send_message(channel_id, payload).await?;

        self.events
            .emit(
                AGENT_RESPONSE,
                json!({
                    "channel_id": channel_id,
                    "response": payload,
                    "result": receipt,
                }),
            )
            .await;

        Ok(RouteOutcome::Completed(serde_json::to_value(receipt)?))
    }

    /// Internal system messages, dispatched on the payload `type` field.
    async fn handle_internal(&self, payload: &Value) -> Result<RouteOutcome> {
        match InternalMessageKind::parse(payload) {
            Some(InternalMessageKind::SystemNotification) => {
                let notification_type = payload
                    .get("notification_type")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                tracing::info!(notification_type, "Handling system notification");

                let result = match notification_type {
                    "startup" => json!({
                        "status": "processed",
                        "message": "Startup notification handled",
                    }),
                    "shutdown" => json!({
                        "status": "processed",
                        "message": "Shutdown notification handled",
                    }),
                    "health_check" => self.health_check().await,
                    other => json!({
                        "status": "processed",
                        "message": format!("Notification {} handled", other),
                    }),
                };
                Ok(RouteOutcome::Completed(result))
            }
            Some(InternalMessageKind::HealthCheck) => {
                Ok(RouteOutcome::Completed(self.health_check().await))
            }
            None => {
                tracing::warn!(
                    kind = payload.get("type").and_then(serde_json::Value::as_str).unwrap_or(""),
                    "Unknown internal message type"
                );
                Ok(RouteOutcome::NotRouted)
            }
        }
    }

    /// Aggregated health report: gateway state plus per-component status.
    pub async fn health_check(&self) -> Value {
        let state = *self.state.read().await;
        let mut components_report = serde_json::Map::new();

        if let Some(components) = self.components.read().await.clone() {
            components_report.insert(
                "agents".to_string(),
                components.agents.health_check().await,
            );
            components_report.insert(
                "channels".to_string(),
                components.channels.health_check().await,
            );
            if let Some(memory) = &components.memory {
                components_report.insert(
                    "memory".to_string(),
                    serde_json::to_value(memory.health_check().await).unwrap_or_default(),
                );
            }
        }

        json!({
            "gateway": state.to_string(),
            "timestamp": Utc::now(),
            "components": components_report,
        })
    }
}

/// Periodic expired-entry cleanup, aborted on gateway stop.
fn spawn_cleanup_task(memory: Arc<MemoryStore>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        // The first tick completes immediately; skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match memory.cleanup_expired_entries().await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "Removed expired memory entries"),
                Err(e) => tracing::warn!("Expired-entry cleanup failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, AgentReply, EchoAgent};
    use crate::channels::MockChannel;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    struct SleepyAgent;

    #[async_trait]
    impl Agent for SleepyAgent {
        fn id(&self) -> &str {
            "sleepy-agent"
        }

        async fn process_message(&self, payload: &Value) -> Result<AgentReply> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(AgentReply {
                agent_id: "sleepy-agent".to_string(),
                response_text: "finally".to_string(),
                timestamp: Utc::now(),
                original_request: payload.clone(),
            })
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        fn id(&self) -> &str {
            "failing-agent"
        }

        async fn process_message(&self, _payload: &Value) -> Result<AgentReply> {
            Err(Error::Agent("model unavailable".to_string()))
        }
    }

    struct Fixture {
        gateway: Gateway,
        memory: Arc<MemoryStore>,
        channels: Arc<ChannelManager>,
    }

    async fn fixture_with_agent(agent: Arc<dyn Agent>) -> Fixture {
        let memory = Arc::new(MemoryStore::connect_in_memory().await.unwrap());
        let agents = Arc::new(AgentManager::with_default(agent).await);
        let channels = Arc::new(ChannelManager::new());
        channels.register(Arc::new(MockChannel::new("mock"))).await;

        let gateway = Gateway::new(RelaybotConfig::default());
        gateway
            .initialize(agents, channels.clone(), Some(memory.clone()))
            .await
            .unwrap();
        gateway.start().await.unwrap();

        Fixture {
            gateway,
            memory,
            channels,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with_agent(Arc::new(EchoAgent::new("default-agent", "gpt-4o"))).await
    }

    fn inbound_payload() -> Value {
        json!({"content": "hi", "channel": "c1", "user_id": "u1"})
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let gateway = Gateway::new(RelaybotConfig::default());
        assert_eq!(gateway.state().await, GatewayState::Uninitialized);

        // start and route are invalid before initialize
        assert!(matches!(
            gateway.start().await,
            Err(Error::NotRunning { .. })
        ));
        assert!(matches!(
            gateway.stop().await,
            Err(Error::NotRunning { .. })
        ));

        gateway
            .initialize(
                Arc::new(AgentManager::new()),
                Arc::new(ChannelManager::new()),
                None,
            )
            .await
            .unwrap();
        assert_eq!(gateway.state().await, GatewayState::Initialized);

        gateway.start().await.unwrap();
        assert_eq!(gateway.state().await, GatewayState::Running);

        gateway.stop().await.unwrap();
        assert_eq!(gateway.state().await, GatewayState::Stopped);

        // stop is idempotent once stopped
        gateway.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_initialize_twice_fails() {
        let fx = fixture().await;
        let result = fx
            .gateway
            .initialize(
                Arc::new(AgentManager::new()),
                Arc::new(ChannelManager::new()),
                None,
            )
            .await;
        assert!(matches!(result, Err(Error::NotRunning { .. })));
    }

    #[tokio::test]
    async fn test_route_fails_before_start() {
        let gateway = Gateway::new(RelaybotConfig::default());
        gateway
            .initialize(
                Arc::new(AgentManager::new()),
                Arc::new(ChannelManager::new()),
                None,
            )
            .await
            .unwrap();

        let result = gateway
            .route_message("channel", "agent", inbound_payload())
            .await;
        assert!(matches!(result, Err(Error::NotRunning { .. })));
    }

    #[tokio::test]
    async fn test_route_fails_after_stop() {
        let fx = fixture().await;
        fx.gateway.stop().await.unwrap();

        let result = fx
            .gateway
            .route_message("channel", "agent", inbound_payload())
            .await;
        assert!(matches!(result, Err(Error::NotRunning { .. })));
    }

    #[tokio::test]
    async fn test_unregistered_route_is_noop() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message("system", "internal", json!({"type": "system_notification"}))
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::NotRouted);
    }

    #[tokio::test]
    async fn test_channel_to_agent_routes_and_persists() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message("channel", "agent", inbound_payload())
            .await
            .unwrap();

        let result = outcome.into_value().unwrap();
        assert_eq!(result["agent_id"], "default-agent");
        assert!(result["response_text"].as_str().unwrap().contains("Hello"));

        // The exchange was persisted with the payload's channel and user
        let recent = fx
            .memory
            .get_recent_interactions(Some("u1"), 1)
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].source, "c1");
        assert_eq!(recent[0].user_id, "u1");
        assert_eq!(recent[0].input_text, "hi");
        assert_eq!(recent[0].metadata.as_ref().unwrap()["type"], "channel_to_agent");
    }

    #[tokio::test]
    async fn test_channel_to_agent_without_default_agent_is_noop() {
        let memory = Arc::new(MemoryStore::connect_in_memory().await.unwrap());
        let gateway = Gateway::new(RelaybotConfig::default());
        gateway
            .initialize(
                Arc::new(AgentManager::new()),
                Arc::new(ChannelManager::new()),
                Some(memory),
            )
            .await
            .unwrap();
        gateway.start().await.unwrap();

        let outcome = gateway
            .route_message("channel", "agent", inbound_payload())
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::NotRouted);
    }

    #[tokio::test]
    async fn test_agent_to_channel_delivers() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message(
                "agent",
                "channel",
                json!({"channel_id": "mock", "recipient_id": "u1", "text": "pong"}),
            )
            .await
            .unwrap();

        let receipt = outcome.into_value().unwrap();
        assert_eq!(receipt["success"], true);
        assert_eq!(receipt["channel"], "mock");
    }

    #[tokio::test]
    async fn test_agent_to_channel_missing_channel_id_is_noop() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message("agent", "channel", json!({"text": "orphan"}))
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::NotRouted);
    }

    #[tokio::test]
    async fn test_agent_to_channel_unknown_channel_reports_failure() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message(
                "agent",
                "channel",
                json!({"channel_id": "missing", "text": "lost"}),
            )
            .await
            .unwrap();

        let receipt = outcome.into_value().unwrap();
        assert_eq!(receipt["success"], false);
    }

    #[tokio::test]
    async fn test_agent_response_event_emitted() {
        let fx = fixture().await;
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        fx.gateway
            .register_event_handler(
                AGENT_RESPONSE,
                Arc::new(move |record| {
                    assert_eq!(record.data["channel_id"], "mock");
                    seen_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .await;

        fx.gateway
            .route_message(
                "agent",
                "channel",
                json!({"channel_id": "mock", "text": "pong"}),
            )
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_events_emitted_in_order_around_handler() {
        let fx = fixture().await;
        let order: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));

        for topic in [MESSAGE_RECEIVED, MESSAGE_PROCESSED] {
            let order = order.clone();
            fx.gateway
                .register_event_handler(
                    topic,
                    Arc::new(move |record| {
                        order.lock().unwrap().push(record.topic.clone());
                        Ok(())
                    }),
                )
                .await;
        }

        fx.gateway
            .route_message("channel", "agent", inbound_payload())
            .await
            .unwrap();

        assert_eq!(
            *order.lock().unwrap(),
            vec!["message_received", "message_processed"]
        );
    }

    #[tokio::test]
    async fn test_raising_observer_does_not_affect_route_result() {
        let fx = fixture().await;
        fx.gateway
            .register_event_handler(
                MESSAGE_PROCESSED,
                Arc::new(|_| Err(Error::Validation("observer blew up".to_string()))),
            )
            .await;

        let outcome = fx
            .gateway
            .route_message("channel", "agent", inbound_payload())
            .await
            .unwrap();
        assert!(outcome.is_routed());
    }

    #[tokio::test]
    async fn test_remove_event_handler_via_gateway() {
        let fx = fixture().await;
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        let id = fx
            .gateway
            .register_event_handler(
                MESSAGE_RECEIVED,
                Arc::new(move |_| {
                    seen_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .await;

        fx.gateway.remove_event_handler(MESSAGE_RECEIVED, id).await;
        // Removing again is a silent no-op
        fx.gateway.remove_event_handler(MESSAGE_RECEIVED, id).await;

        fx.gateway
            .route_message("channel", "agent", inbound_payload())
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_wraps_as_routing_error() {
        let fx = fixture_with_agent(Arc::new(FailingAgent)).await;
        let errors_seen = Arc::new(AtomicUsize::new(0));
        let errors_clone = errors_seen.clone();
        fx.gateway
            .register_event_handler(
                ERROR_OCCURRED,
                Arc::new(move |_| {
                    errors_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .await;

        let result = fx
            .gateway
            .route_message("channel", "agent", inbound_payload())
            .await;

        match result {
            Err(Error::Routing { context, source }) => {
                assert_eq!(context, "channel_to_agent");
                assert!(matches!(*source, Error::Agent(_)));
            }
            other => panic!("expected routing error, got {:?}", other),
        }
        assert_eq!(errors_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_surfaces_typed_error() {
        let fx = fixture_with_agent(Arc::new(SleepyAgent)).await;
        let errors_seen = Arc::new(AtomicUsize::new(0));
        let errors_clone = errors_seen.clone();
        fx.gateway
            .register_event_handler(
                ERROR_OCCURRED,
                Arc::new(move |_| {
                    errors_clone.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .await;

        let result = fx
            .gateway
            .route_message_with_timeout(
                "channel",
                "agent",
                inbound_payload(),
                Duration::from_millis(20),
            )
            .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(errors_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_route_within_timeout_succeeds() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message_with_timeout(
                "channel",
                "agent",
                inbound_payload(),
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert!(outcome.is_routed());
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_unwind_route() {
        let fx = fixture().await;
        // Take the durable tier down; the route must still succeed
        fx.memory.close().await;

        let outcome = fx
            .gateway
            .route_message("channel", "agent", inbound_payload())
            .await
            .unwrap();
        assert!(outcome.is_routed());
    }

    #[tokio::test]
    async fn test_internal_health_check() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message("internal", "message", json!({"type": "component_health_check"}))
            .await
            .unwrap();

        let report = outcome.into_value().unwrap();
        assert_eq!(report["gateway"], "running");
        assert_eq!(report["components"]["memory"]["status"], "healthy");
        assert!(report["components"]["agents"]["agent_count"].is_number());
    }

    #[tokio::test]
    async fn test_internal_system_notification() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message(
                "internal",
                "message",
                json!({"type": "system_notification", "notification_type": "startup"}),
            )
            .await
            .unwrap();

        let result = outcome.into_value().unwrap();
        assert_eq!(result["status"], "processed");
        assert!(result["message"].as_str().unwrap().contains("Startup"));
    }

    #[tokio::test]
    async fn test_internal_unknown_type_is_noop() {
        let fx = fixture().await;
        let outcome = fx
            .gateway
            .route_message("internal", "message", json!({"type": "mystery"}))
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::NotRouted);
    }

    #[tokio::test]
    async fn test_custom_selector_replaces_policy() {
        struct NoneSelector;

        #[async_trait]
        impl AgentSelector for NoneSelector {
            async fn select(&self, _: &Value, _: &AgentManager) -> Option<String> {
                None
            }
        }

        let fx = fixture().await;
        fx.gateway.set_agent_selector(Arc::new(NoneSelector)).await;

        let outcome = fx
            .gateway
            .route_message("channel", "agent", inbound_payload())
            .await
            .unwrap();
        assert_eq!(outcome, RouteOutcome::NotRouted);
    }

    #[tokio::test]
    async fn test_concurrent_routes() {
        let fx = Arc::new(fixture().await);
        let mut handles = Vec::new();
        for i in 0..8 {
            let fx = fx.clone();
            handles.push(tokio::spawn(async move {
                fx.gateway
                    .route_message(
                        "channel",
                        "agent",
                        json!({"content": format!("msg {}", i), "channel": "c1", "user_id": "u1"}),
                    )
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_routed());
        }

        let recent = fx.memory.get_recent_interactions(None, 20).await.unwrap();
        assert_eq!(recent.len(), 8);
    }

    #[tokio::test]
    async fn test_stopped_channels_after_gateway_stop() {
        let fx = fixture().await;
        fx.gateway.stop().await.unwrap();

        let health = fx.channels.health_check().await;
        assert_eq!(health["channels"]["mock"]["is_running"], false);
    }
}
