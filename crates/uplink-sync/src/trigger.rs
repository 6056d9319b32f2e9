//! Event-driven sync.
//!
//! Subscribes to the bus and forwards every `SyncEvent` to the strategy in
//! delivery order. Always force-syncs; there is no "recently synced"
//! short-circuit on this path.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use uplink_core::bus::EventBus;
use uplink_core::transport::SessionSlot;

use crate::strategy::SyncStrategy;

/// Bridges the bus to the strategy. Holds no mutable state of its own.
pub struct EventSyncTrigger {
    strategy: Arc<dyn SyncStrategy>,
    slot: Arc<SessionSlot>,
}

impl EventSyncTrigger {
    pub fn new(strategy: Arc<dyn SyncStrategy>, slot: Arc<SessionSlot>) -> Self {
        Self { strategy, slot }
    }

    /// Subscribe to the bus and spawn the forwarding task.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe_sync();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        tracing::debug!(
                            op = event.op.as_str(),
                            path = event.path.as_str(),
                            "Got sync event"
                        );
                        self.strategy.sync(
                            self.slot.current().as_ref(),
                            event.op,
                            &event.path,
                            &event.value,
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Sync trigger lagged, dropped events");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, sync trigger exiting");
                        break;
                    }
                }
            }
        })
    }
}
