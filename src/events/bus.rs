//! Event bus implementation
//!
//! Observers are invoked in registration order, sequentially, within one
//! `emit` call. There is no ordering guarantee across concurrent emits on
//! the same topic. Emission is a synchronous fan-out: each observer's
//! outcome is captured independently and a failure never stops delivery to
//! the observers after it.

use crate::events::types::{
    EventRecord, Observer, ObserverId, AGENT_RESPONSE, ERROR_OCCURRED, MESSAGE_PROCESSED,
    MESSAGE_RECEIVED,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-process event bus with per-topic ordered observer lists.
pub struct EventBus {
    observers: RwLock<HashMap<String, Vec<(ObserverId, Observer)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a bus with the four built-in lifecycle topics pre-registered.
    pub fn new() -> Self {
        let mut observers = HashMap::new();
        for topic in [
            MESSAGE_RECEIVED,
            MESSAGE_PROCESSED,
            AGENT_RESPONSE,
            ERROR_OCCURRED,
        ] {
            observers.insert(topic.to_string(), Vec::new());
        }

        Self {
            observers: RwLock::new(observers),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer on a topic, creating the topic if unknown.
    ///
    /// Returns the id used to remove this registration later.
    pub async fn register(&self, topic: &str, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push((id, observer));

        tracing::debug!(topic, observer_id = id.0, "Registered event observer");
        id
    }

    /// Remove a previously registered observer.
    ///
    /// Removing an id that is not registered on the topic is a no-op.
    /// Returns whether a registration was removed.
    pub async fn remove(&self, topic: &str, id: ObserverId) -> bool {
        let mut observers = self.observers.write().await;
        if let Some(list) = observers.get_mut(topic) {
            if let Some(pos) = list.iter().position(|(oid, _)| *oid == id) {
                list.remove(pos);
                tracing::debug!(topic, observer_id = id.0, "Removed event observer");
                return true;
            }
        }
        false
    }

    /// Emit an event to every observer registered on `topic`.
    ///
    /// Returns the number of observers invoked.
    pub async fn emit(&self, topic: &str, data: serde_json::Value) -> usize {
        // Snapshot under the read lock; delivery happens without holding it.
        let snapshot: Vec<(ObserverId, Observer)> = {
            let observers = self.observers.read().await;
            match observers.get(topic) {
                Some(list) => list.clone(),
                None => return 0,
            }
        };

        let record = EventRecord::new(topic, data);
        for (id, observer) in &snapshot {
            if let Err(e) = observer(&record) {
                tracing::error!(topic, observer_id = id.0, "Error in event observer: {}", e);
            }
        }

        snapshot.len()
    }

    /// Number of observers currently registered on a topic.
    pub async fn observer_count(&self, topic: &str) -> usize {
        self.observers
            .read()
            .await
            .get(topic)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    /// All known topics, built-in and registered.
    pub async fn topics(&self) -> Vec<String> {
        self.observers.read().await.keys().cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    fn counting_observer(counter: Arc<AtomicUsize>) -> Observer {
        Arc::new(move |_record| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_builtin_topics_exist() {
        let bus = EventBus::new();
        let mut topics = bus.topics().await;
        topics.sort();
        assert_eq!(
            topics,
            vec![
                "agent_response",
                "error_occurred",
                "message_processed",
                "message_received"
            ]
        );
    }

    #[tokio::test]
    async fn test_emit_delivers_to_registered_observer() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.register(MESSAGE_RECEIVED, counting_observer(counter.clone()))
            .await;

        let delivered = bus
            .emit(MESSAGE_RECEIVED, serde_json::json!({"k": "v"}))
            .await;

        assert_eq!(delivered, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_emit_unknown_topic_is_noop() {
        let bus = EventBus::new();
        let delivered = bus.emit("no_such_topic", serde_json::json!({})).await;
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_unknown_topic_created_on_first_registration() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.register("custom_topic", counting_observer(counter.clone()))
            .await;

        assert_eq!(bus.observer_count("custom_topic").await, 1);
        bus.emit("custom_topic", serde_json::json!({})).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observers_invoked_in_registration_order() {
        let bus = EventBus::new();
        let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        for label in [1u32, 2, 3] {
            let order = order.clone();
            bus.register(
                MESSAGE_PROCESSED,
                Arc::new(move |_| {
                    order.lock().unwrap().push(label);
                    Ok(())
                }),
            )
            .await;
        }

        bus.emit(MESSAGE_PROCESSED, serde_json::json!({})).await;
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failing_observer_does_not_stop_delivery() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));

        bus.register(
            ERROR_OCCURRED,
            Arc::new(|_| Err(Error::Validation("observer failure".to_string()))),
        )
        .await;
        bus.register(ERROR_OCCURRED, counting_observer(counter.clone()))
            .await;

        let delivered = bus.emit(ERROR_OCCURRED, serde_json::json!({})).await;

        // Both observers ran despite the first one failing
        assert_eq!(delivered, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_observer() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = bus
            .register(MESSAGE_RECEIVED, counting_observer(counter.clone()))
            .await;

        assert!(bus.remove(MESSAGE_RECEIVED, id).await);
        bus.emit(MESSAGE_RECEIVED, serde_json::json!({})).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_unregistered_is_noop() {
        let bus = EventBus::new();
        let id = bus.register(MESSAGE_RECEIVED, Arc::new(|_| Ok(()))).await;

        // Wrong topic, then double removal: both silent no-ops
        assert!(!bus.remove(MESSAGE_PROCESSED, id).await);
        assert!(bus.remove(MESSAGE_RECEIVED, id).await);
        assert!(!bus.remove(MESSAGE_RECEIVED, id).await);
    }

    #[tokio::test]
    async fn test_removal_preserves_remaining_order() {
        let bus = EventBus::new();
        let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

        let mut ids = Vec::new();
        for label in [1u32, 2, 3] {
            let order = order.clone();
            ids.push(
                bus.register(
                    MESSAGE_RECEIVED,
                    Arc::new(move |_| {
                        order.lock().unwrap().push(label);
                        Ok(())
                    }),
                )
                .await,
            );
        }

        bus.remove(MESSAGE_RECEIVED, ids[1]).await;
        bus.emit(MESSAGE_RECEIVED, serde_json::json!({})).await;
        assert_eq!(*order.lock().unwrap(), vec![1, 3]);
    }
}
