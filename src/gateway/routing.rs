//! Route keys and routing outcomes
//!
//! Routes are a closed set: the `(source, destination)` pair is parsed into
//! a [`RouteKey`] variant once, and dispatch is a compile-time-checked match
//! on that enum. A pair that parses to nothing is the explicit
//! unregistered-route case — a deliberate no-op, not an error. Internal
//! message kinds follow the same pattern.

use std::fmt;

/// The built-in routes, keyed by `(source, destination)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKey {
    /// `channel` → `agent`: inbound message to a responder
    ChannelToAgent,
    /// `agent` → `channel`: outbound response to a communication surface
    AgentToChannel,
    /// `internal` → `message`: system notifications and health checks
    Internal,
}

impl RouteKey {
    /// Parse a `(source, destination)` pair.
    ///
    /// `None` means no handler is registered for the pair; callers treat
    /// that as a no-op.
    pub fn parse(source: &str, destination: &str) -> Option<Self> {
        match (source, destination) {
            ("channel", "agent") => Some(Self::ChannelToAgent),
            ("agent", "channel") => Some(Self::AgentToChannel),
            ("internal", "message") => Some(Self::Internal),
            _ => None,
        }
    }

    /// The underscored route key, e.g. `channel_to_agent`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChannelToAgent => "channel_to_agent",
            Self::AgentToChannel => "agent_to_channel",
            Self::Internal => "internal_message",
        }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The internal message kinds dispatched on the payload `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalMessageKind {
    /// `system_notification`: startup/shutdown/health notifications
    SystemNotification,
    /// `component_health_check`: aggregated component health report
    HealthCheck,
}

impl InternalMessageKind {
    /// Parse the `type` field of an internal payload; unknown kinds are a
    /// no-op for the caller.
    pub fn parse(payload: &serde_json::Value) -> Option<Self> {
        match payload.get("type").and_then(serde_json::Value::as_str) {
            Some("system_notification") => Some(Self::SystemNotification),
            Some("component_health_check") => Some(Self::HealthCheck),
            _ => None,
        }
    }
}

/// Result of one `route_message` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// The handler ran; its result is carried verbatim.
    Completed(serde_json::Value),

    /// Unregistered route or a payload missing the field the handler
    /// needs. Callers must check for this — it is not an error.
    NotRouted,
}

impl RouteOutcome {
    /// Whether a handler actually ran.
    pub fn is_routed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The handler result, if any.
    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Completed(value) => Some(value),
            Self::NotRouted => None,
        }
    }

    /// Consume the outcome, yielding the handler result if any.
    pub fn into_value(self) -> Option<serde_json::Value> {
        match self {
            Self::Completed(value) => Some(value),
            Self::NotRouted => None,
        }
    }
}
