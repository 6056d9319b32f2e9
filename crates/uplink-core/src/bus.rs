//! Typed process-wide event bus.
//!
//! An explicit publish/subscribe registry owned by the composition root and
//! passed by reference, so tests construct an isolated bus each. One
//! broadcast channel per event type keeps subscriptions closed over the
//! types they carry.

use tokio::sync::broadcast;

use crate::events::{SyncEvent, UiLoadedEvent};

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Process-wide publish/subscribe registry.
pub struct EventBus {
    sync_tx: broadcast::Sender<SyncEvent>,
    ui_loaded_tx: broadcast::Sender<UiLoadedEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sync_tx, _) = broadcast::channel(capacity);
        let (ui_loaded_tx, _) = broadcast::channel(capacity);
        Self {
            sync_tx,
            ui_loaded_tx,
        }
    }

    /// Publish a state-change notification. Returns how many subscribers
    /// received it.
    pub fn publish_sync(&self, event: SyncEvent) -> usize {
        match self.sync_tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                tracing::trace!("No subscribers for sync event");
                0
            }
        }
    }

    pub fn subscribe_sync(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync_tx.subscribe()
    }

    /// Announce that the frontend finished loading. Fire-and-forget.
    pub fn publish_ui_loaded(&self, event: UiLoadedEvent) -> usize {
        match self.ui_loaded_tx.send(event) {
            Ok(count) => count,
            Err(_) => {
                tracing::trace!("No subscribers for UI-loaded event");
                0
            }
        }
    }

    pub fn subscribe_ui_loaded(&self) -> broadcast::Receiver<UiLoadedEvent> {
        self.ui_loaded_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SyncOp, SyncPath};

    #[test]
    fn publish_without_subscribers_reaches_nobody() {
        let bus = EventBus::default();
        let reached = bus.publish_sync(SyncEvent::add(SyncPath::All, serde_json::json!({})));
        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_sync();

        let reached = bus.publish_sync(SyncEvent::new(
            SyncOp::Remove,
            SyncPath::Custom("config".into()),
            serde_json::json!(null),
        ));
        assert_eq!(reached, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.op, SyncOp::Remove);
        assert_eq!(event.path.as_str(), "config");
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_sync();

        for i in 0..5 {
            bus.publish_sync(SyncEvent::add(SyncPath::Peers, serde_json::json!(i)));
        }
        for i in 0..5 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.value, serde_json::json!(i));
        }
    }

    #[tokio::test]
    async fn ui_loaded_channel_is_independent() {
        let bus = EventBus::default();
        let mut sync_rx = bus.subscribe_sync();
        let mut ui_rx = bus.subscribe_ui_loaded();

        bus.publish_ui_loaded(UiLoadedEvent);

        assert_eq!(ui_rx.recv().await.unwrap(), UiLoadedEvent);
        assert!(sync_rx.try_recv().is_err());
    }

    #[test]
    fn buses_are_isolated_from_each_other() {
        let a = EventBus::default();
        let b = EventBus::default();
        let _rx = b.subscribe_sync();

        // A publish on bus A must not reach bus B's subscriber.
        let reached = a.publish_sync(SyncEvent::add(SyncPath::All, serde_json::json!({})));
        assert_eq!(reached, 0);
    }
}
