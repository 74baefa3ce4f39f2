//! Message gateway
//!
//! Routes messages between channels, agents, and the memory store, emitting
//! lifecycle events around every route.

mod routing;
mod server;

pub use routing::{InternalMessageKind, RouteKey, RouteOutcome};
pub use server::{Gateway, GatewayState};
