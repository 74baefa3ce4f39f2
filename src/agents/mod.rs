//! Agents and agent selection
//!
//! Autonomous responders resolved by id, plus the pluggable policy that
//! picks one for each inbound message.

mod manager;
mod types;

pub use manager::{AgentManager, AgentSelector, DefaultAgentSelector};
pub use types::{Agent, AgentReply, EchoAgent};
