//! Interaction and memory storage
//!
//! Two-tier lookup: bounded in-process caches (recency for interactions,
//! importance for memory entries) in front of a durable SQLite store.
//! Writes are write-through; reads prefer the caches and degrade to
//! cache-only results when the durable tier is unavailable.

pub mod cache;
pub mod store;
pub mod types;

pub use cache::{ImportanceCache, RecencyCache, IMPORTANCE_THRESHOLD};
pub use store::{MemoryHealth, MemoryStore};
pub use types::{Interaction, MemoryEntry, NewInteraction, NewMemoryEntry};
