use crate::events::{BotEvent, BotEventType};
use arb_bot_core::{BotRecord, BotStatus};
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc, RwLock};

/// In-process subscribers per event type; sized for a handful of local
/// consumers, not a fan-out tier.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 100;

/// Publish/subscribe hub plus the registry of live observer connections.
///
/// Observers receive every event as pre-serialized JSON over an unbounded
/// channel; an observer whose channel is closed is pruned on the next
/// broadcast, so one dead connection never blocks or fails delivery to the
/// rest. Local in-process consumers subscribe per event type and
/// unsubscribe by dropping their receiver.
pub struct EventHub {
    observers: RwLock<HashMap<String, mpsc::UnboundedSender<String>>>,
    channels: HashMap<BotEventType, broadcast::Sender<BotEvent>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    #[must_use]
    pub fn new() -> Self {
        let channels = BotEventType::ALL
            .into_iter()
            .map(|event_type| {
                let (tx, _rx) = broadcast::channel(SUBSCRIBER_CHANNEL_CAPACITY);
                (event_type, tx)
            })
            .collect();

        Self {
            observers: RwLock::new(HashMap::new()),
            channels,
        }
    }

    /// Registers an observer connection under the given id.
    pub async fn add_observer(&self, id: impl Into<String>, tx: mpsc::UnboundedSender<String>) {
        let id = id.into();
        let mut observers = self.observers.write().await;
        observers.insert(id.clone(), tx);
        tracing::info!("Client {id} connected, total clients: {}", observers.len());
    }

    /// Removes an observer; a no-op when the id is unknown.
    pub async fn remove_observer(&self, id: &str) {
        let mut observers = self.observers.write().await;
        if observers.remove(id).is_some() {
            tracing::info!(
                "Client {id} disconnected, remaining clients: {}",
                observers.len()
            );
        }
    }

    #[must_use]
    pub async fn observer_count(&self) -> usize {
        self.observers.read().await.len()
    }

    /// Subscribes to one event type. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self, event_type: BotEventType) -> broadcast::Receiver<BotEvent> {
        self.channels[&event_type].subscribe()
    }

    pub async fn emit_status_changed(&self, bot: &BotRecord, previous: BotStatus) {
        self.publish(BotEvent::status_changed(bot, previous)).await;
    }

    pub async fn emit_error(&self, bot_id: &str, message: &str) {
        self.publish(BotEvent::error(bot_id, message)).await;
    }

    pub async fn emit_execution_result(&self, bot_id: &str, data: serde_json::Value) {
        self.publish(BotEvent::execution_result(bot_id, data)).await;
    }

    async fn publish(&self, event: BotEvent) {
        // Local subscribers first; no receivers is fine.
        let _ = self.channels[&event.event_type].send(event.clone());
        self.broadcast(&event).await;
    }

    /// Serializes once and attempts delivery to every observer, pruning
    /// any whose channel has closed.
    async fn broadcast(&self, event: &BotEvent) {
        let message = match serde_json::to_string(event) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Failed to serialize event for broadcast: {e}");
                return;
            }
        };

        let mut observers = self.observers.write().await;
        observers.retain(|id, tx| {
            if tx.send(message.clone()).is_ok() {
                true
            } else {
                tracing::info!("Client {id} channel closed, removing observer");
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_all_observers() {
        let hub = EventHub::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.add_observer("c1", tx1).await;
        hub.add_observer("c2", tx2).await;

        hub.emit_error("b1", "boom").await;

        let msg1 = rx1.recv().await.unwrap();
        let msg2 = rx2.recv().await.unwrap();
        assert_eq!(msg1, msg2);
        assert!(msg1.contains("\"botId\":\"b1\""));
    }

    #[tokio::test]
    async fn dead_observer_is_pruned_without_failing_the_rest() {
        let hub = EventHub::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        hub.add_observer("dead", tx1).await;
        hub.add_observer("c2", tx2).await;
        hub.add_observer("c3", tx3).await;
        drop(rx1);

        hub.emit_error("b1", "boom").await;

        assert!(rx2.recv().await.is_some());
        assert!(rx3.recv().await.is_some());
        assert_eq!(hub.observer_count().await, 2);
    }

    #[tokio::test]
    async fn remove_observer_is_idempotent() {
        let hub = EventHub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        hub.add_observer("c1", tx).await;

        hub.remove_observer("c1").await;
        hub.remove_observer("c1").await;
        assert_eq!(hub.observer_count().await, 0);
    }

    #[tokio::test]
    async fn local_subscribers_get_typed_events() {
        let hub = EventHub::new();
        let mut errors = hub.subscribe(BotEventType::Error);
        let mut results = hub.subscribe(BotEventType::ExecutionResult);

        hub.emit_error("b1", "boom").await;

        let event = errors.recv().await.unwrap();
        assert_eq!(event.event_type, BotEventType::Error);
        // The result channel saw nothing.
        assert!(matches!(
            results.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
