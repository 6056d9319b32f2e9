//! Test doubles for the sync engine.
//!
//! Deterministic stand-ins for the strategy and the transport session, used
//! by this crate's tests and available to downstream crates.

use std::sync::Arc;

use parking_lot::Mutex;

use uplink_core::errors::TransportError;
use uplink_core::events::{SyncOp, SyncPath};
use uplink_core::ids::SessionId;
use uplink_core::transport::{RemovalCallback, SessionHandle};

use crate::strategy::SyncStrategy;

/// One delegated call observed by a [`RecordingStrategy`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedSync {
    pub session: Option<SessionId>,
    pub op: SyncOp,
    pub path: SyncPath,
    pub value: serde_json::Value,
}

/// Strategy that records every delegated call instead of pushing anything.
#[derive(Default)]
pub struct RecordingStrategy {
    calls: Mutex<Vec<RecordedSync>>,
}

impl RecordingStrategy {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<RecordedSync> {
        self.calls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}

impl SyncStrategy for RecordingStrategy {
    fn sync(
        &self,
        session: Option<&Arc<dyn SessionHandle>>,
        op: SyncOp,
        path: &SyncPath,
        value: &serde_json::Value,
    ) {
        self.calls.lock().push(RecordedSync {
            session: session.map(|s| s.id().clone()),
            op,
            path: path.clone(),
            value: value.clone(),
        });
    }
}

enum StubRemoval {
    Live(Vec<RemovalCallback>),
    Removed { was_timeout: bool },
}

/// In-memory session: collects pushed frames and supports removal.
pub struct StubSession {
    id: SessionId,
    frames: Mutex<Vec<(SyncPath, String)>>,
    removal: Mutex<StubRemoval>,
}

impl StubSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: SessionId::new(),
            frames: Mutex::new(Vec::new()),
            removal: Mutex::new(StubRemoval::Live(Vec::new())),
        })
    }

    /// Frames pushed so far, in order.
    pub fn frames(&self) -> Vec<(SyncPath, String)> {
        self.frames.lock().clone()
    }

    /// Simulate the transport reporting the session gone. Fires registered
    /// removal callbacks once; repeat calls are no-ops.
    pub fn remove(&self, was_timeout: bool) {
        let callbacks = {
            let mut removal = self.removal.lock();
            match std::mem::replace(&mut *removal, StubRemoval::Removed { was_timeout }) {
                StubRemoval::Live(callbacks) => callbacks,
                already_removed => {
                    *removal = already_removed;
                    return;
                }
            }
        };
        for callback in callbacks {
            callback(was_timeout);
        }
    }
}

impl SessionHandle for StubSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn push(&self, path: &SyncPath, payload: String) -> Result<(), TransportError> {
        if matches!(&*self.removal.lock(), StubRemoval::Removed { .. }) {
            return Err(TransportError::SessionClosed);
        }
        self.frames.lock().push((path.clone(), payload));
        Ok(())
    }

    fn on_removed(&self, callback: RemovalCallback) {
        let mut removal = self.removal.lock();
        match &mut *removal {
            StubRemoval::Live(callbacks) => callbacks.push(callback),
            StubRemoval::Removed { was_timeout } => {
                let was_timeout = *was_timeout;
                drop(removal);
                callback(was_timeout);
            }
        }
    }
}
