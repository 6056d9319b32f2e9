//! Sync service orchestrator.
//!
//! Owns the periodic scheduler, the connection lifecycle tracker, and the
//! event trigger subscription, and exposes the lifecycle controls the rest
//! of the backend calls.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use uplink_core::bus::EventBus;
use uplink_core::events::{SyncOp, SyncPath};
use uplink_core::model::StateModel;
use uplink_core::transport::{SessionHandle, SessionSlot};

use crate::lifecycle::{ConnectionTracker, SyncedFlag};
use crate::scheduler::{PeriodicSync, SchedulerConfig};
use crate::strategy::SyncStrategy;
use crate::trigger::EventSyncTrigger;

const DEFAULT_BROWSER_TYPE: &str = "unknown";

struct Attached {
    bus: Arc<EventBus>,
    _trigger: JoinHandle<()>,
}

/// Pushes updated backend state to the client.
///
/// Construction has no side effects; the composition root calls
/// [`SyncService::attach`] to subscribe to the bus, then wires the transport
/// to [`SyncService::on_client_subscribe`].
pub struct SyncService {
    strategy: Arc<dyn SyncStrategy>,
    slot: Arc<SessionSlot>,
    scheduler: PeriodicSync,
    tracker: ConnectionTracker,
    flag: Arc<SyncedFlag>,
    attached: Mutex<Option<Attached>>,
    browser_type: RwLock<String>,
}

impl SyncService {
    pub fn new(
        strategy: Arc<dyn SyncStrategy>,
        model: Arc<dyn StateModel>,
        slot: Arc<SessionSlot>,
        config: SchedulerConfig,
    ) -> Self {
        let flag = Arc::new(SyncedFlag::new());
        let scheduler = PeriodicSync::new(
            Arc::clone(&strategy),
            Arc::clone(&slot),
            Arc::clone(&model),
            config,
        );
        let tracker = ConnectionTracker::new(Arc::clone(&strategy), model, Arc::clone(&flag));
        Self {
            strategy,
            slot,
            scheduler,
            tracker,
            flag,
            attached: Mutex::new(None),
            browser_type: RwLock::new(DEFAULT_BROWSER_TYPE.to_string()),
        }
    }

    /// Subscribe to the bus. Called once by the composition root, after
    /// construction and before any client traffic; attaching again is a
    /// logged no-op that keeps the first subscription.
    pub fn attach(&self, bus: &Arc<EventBus>) {
        let mut attached = self.attached.lock();
        if attached.is_some() {
            tracing::warn!("Sync service already attached to a bus");
            return;
        }
        let trigger =
            EventSyncTrigger::new(Arc::clone(&self.strategy), Arc::clone(&self.slot)).spawn(bus);
        *attached = Some(Attached {
            bus: Arc::clone(bus),
            _trigger: trigger,
        });
    }

    /// Begin periodic delta syncs.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Stop periodic delta syncs. Idempotent; safe if never started.
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Liveness probe pushed to the client regardless of synced state.
    pub fn send_ping(&self) {
        self.delegate(SyncOp::Ping, &SyncPath::Ping, &serde_json::Value::String(String::new()));
        tracing::debug!("Sending ping to client");
    }

    pub fn is_client_synced(&self) -> bool {
        self.flag.is_synced()
    }

    /// Free-form description of the connected frontend. Diagnostics only.
    pub fn set_browser_type(&self, value: impl Into<String>) {
        *self.browser_type.write() = value.into();
    }

    pub fn browser_type(&self) -> String {
        self.browser_type.read().clone()
    }

    /// Transport adapter entry point: a client subscribed to the sync
    /// channel. Returns immediately; see [`ConnectionTracker::on_subscribe`].
    pub fn on_client_subscribe(&self, session: Arc<dyn SessionHandle>) {
        let bus = self.attached.lock().as_ref().map(|a| Arc::clone(&a.bus));
        if bus.is_none() {
            tracing::warn!("Client subscribed before attach; UI-loaded will not be announced");
        }
        self.tracker.on_subscribe(session, bus);
    }

    fn delegate(&self, op: SyncOp, path: &SyncPath, value: &serde_json::Value) {
        self.strategy.sync(self.slot.current().as_ref(), op, path, value);
    }
}
