//! Client connect/disconnect lifecycle.
//!
//! A client subscribe triggers one full-state push on a worker task, an
//! announcement on the bus that the UI finished loading, and the synced-flag
//! transition. The session's removal notification clears the flag and
//! cancels an unfinished full sync.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use uplink_core::bus::EventBus;
use uplink_core::events::{SyncOp, SyncPath, UiLoadedEvent};
use uplink_core::model::StateModel;
use uplink_core::transport::SessionHandle;

use crate::strategy::SyncStrategy;

struct FlagState {
    /// Sequence of the last applied transition.
    seq: u64,
    synced: bool,
}

/// Whether the client currently holds a full copy of the state.
///
/// Each connect is assigned a monotonic number `n`; its sync-completion
/// carries transition sequence `2n` and its disconnect `2n + 1`. A
/// transition applies only when its sequence exceeds the last applied one,
/// so a disconnect always outranks its own connect's completion regardless
/// of delivery order, and a stale session's removal can never clear the
/// flag a newer connect set.
pub struct SyncedFlag {
    next_connect: AtomicU64,
    state: Mutex<FlagState>,
}

impl SyncedFlag {
    pub fn new() -> Self {
        Self {
            next_connect: AtomicU64::new(1),
            state: Mutex::new(FlagState {
                seq: 0,
                synced: false,
            }),
        }
    }

    /// Allocate the connect number for a new subscribe notification.
    pub fn begin_connect(&self) -> u64 {
        self.next_connect.fetch_add(1, Ordering::Relaxed)
    }

    /// Record that connect `n`'s full sync completed. Returns whether the
    /// transition applied.
    pub fn mark_synced(&self, connect: u64) -> bool {
        self.apply(connect * 2, true)
    }

    /// Record that connect `n`'s session was removed. Returns whether the
    /// transition applied.
    pub fn mark_disconnected(&self, connect: u64) -> bool {
        self.apply(connect * 2 + 1, false)
    }

    pub fn is_synced(&self) -> bool {
        self.state.lock().synced
    }

    fn apply(&self, seq: u64, synced: bool) -> bool {
        let mut state = self.state.lock();
        if seq > state.seq {
            state.seq = seq;
            state.synced = synced;
            true
        } else {
            false
        }
    }
}

impl Default for SyncedFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Reacts to client subscribe and removal notifications.
pub struct ConnectionTracker {
    strategy: Arc<dyn SyncStrategy>,
    model: Arc<dyn StateModel>,
    flag: Arc<SyncedFlag>,
}

impl ConnectionTracker {
    pub fn new(
        strategy: Arc<dyn SyncStrategy>,
        model: Arc<dyn StateModel>,
        flag: Arc<SyncedFlag>,
    ) -> Self {
        Self {
            strategy,
            model,
            flag,
        }
    }

    /// Handle a client subscribe notification.
    ///
    /// Returns immediately: the full sync runs on its own task so the
    /// transport dispatch task stays free. Overlapping subscribes each run
    /// independently; the flag's sequence ordering decides which transition
    /// sticks.
    pub fn on_subscribe(&self, session: Arc<dyn SessionHandle>, bus: Option<Arc<EventBus>>) {
        let connect = self.flag.begin_connect();
        tracing::debug!(
            session = %session.id(),
            connect,
            "Got connection from client, scheduling full sync"
        );

        // Removal clears the flag and cancels an unfinished full sync. The
        // callback registers before the worker spawns so a removal racing
        // the sync cannot be missed.
        let cancel = CancellationToken::new();
        {
            let flag = Arc::clone(&self.flag);
            let token = cancel.clone();
            let session_id = session.id().clone();
            session.on_removed(Box::new(move |was_timeout| {
                token.cancel();
                flag.mark_disconnected(connect);
                tracing::info!(session = %session_id, was_timeout, "Frontend disconnected");
            }));
        }

        let strategy = Arc::clone(&self.strategy);
        let model = Arc::clone(&self.model);
        let flag = Arc::clone(&self.flag);

        tokio::spawn(async move {
            if cancel.is_cancelled() {
                tracing::debug!(session = %session.id(), "Session removed before full sync");
                return;
            }

            tracing::info!(session = %session.id(), "Syncing full state with frontend");
            strategy.sync(Some(&session), SyncOp::Add, &SyncPath::All, &model.all());

            if let Some(bus) = bus {
                bus.publish_ui_loaded(UiLoadedEvent);
            }

            flag.mark_synced(connect);
        });
    }
}
