//! Lifecycle event bus
//!
//! In-process publish mechanism with named event topics and ordered,
//! sequential delivery to registered observers. Observer failures are
//! captured and logged; they never affect the caller.

pub mod bus;
pub mod types;

pub use bus::EventBus;
pub use types::{
    EventRecord, Observer, ObserverId, AGENT_RESPONSE, ERROR_OCCURRED, MESSAGE_PROCESSED,
    MESSAGE_RECEIVED,
};
