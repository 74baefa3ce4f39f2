//! Relaybot - Multi-channel message gateway with durable interaction memory
//!
//! Relaybot routes messages between external communication surfaces
//! ("channels"), autonomous responders ("agents"), and a persistence layer,
//! emitting lifecycle events other parts of the system can observe.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Relaybot Gateway                        │
//! │                                                              │
//! │  route_message(source, destination, payload)                 │
//! │       │                                                      │
//! │       ├─ emit message_received ──────────► Event Bus         │
//! │       │                                    (ordered,         │
//! │       ├─ RouteKey dispatch                  fire-and-        │
//! │       │    ├─ channel_to_agent ─► Agent     continue)        │
//! │       │    ├─ agent_to_channel ─► Channel                    │
//! │       │    └─ internal_message ─► health / notifications     │
//! │       │                                                      │
//! │       ├─ persist Interaction ────► Memory Store              │
//! │       │                            ┌──────────────────────┐  │
//! │       └─ emit message_processed    │ recency cache (100)  │  │
//! │                                    │ importance cache     │  │
//! │                                    │        │             │  │
//! │                                    │     SQLite           │  │
//! │                                    └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every successful channel→agent route is persisted as a [`memory::Interaction`];
//! persisted history feeds future routing decisions through
//! [`memory::MemoryStore::get_recent_interactions`] and
//! [`memory::MemoryStore::search_memory`].
//!
//! ## Modules
//!
//! - [`gateway`]: routing, lifecycle, built-in handlers
//! - [`events`]: lifecycle event bus with ordered observer delivery
//! - [`memory`]: durable interaction/memory storage with bounded caches
//! - [`channels`]: channel adapter contract and registry
//! - [`agents`]: agent contract, registry, and selection policy
//! - [`api`]: thin HTTP status/routing surface
//! - [`config`]: configuration management

pub mod agents;
pub mod api;
pub mod channels;
pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod memory;

pub use config::RelaybotConfig;
pub use error::{Error, Result};
pub use gateway::{Gateway, GatewayState, RouteOutcome};
pub use memory::MemoryStore;
