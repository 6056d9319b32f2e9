//! The interface the sync engine needs from the transport.
//!
//! The transport owns connection establishment, framing, and teardown; the
//! engine sees a session only as an id, a non-blocking push channel, and a
//! removal notification.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::TransportError;
use crate::events::SyncPath;
use crate::ids::SessionId;

/// Invoked once when the transport reports a session gone. The flag is true
/// when the session expired rather than disconnecting explicitly.
pub type RemovalCallback = Box<dyn FnOnce(bool) + Send>;

/// Handle to one connected client's push channel.
///
/// Owned by the transport; the sync engine holds a reference only and never
/// creates or destroys one.
pub trait SessionHandle: Send + Sync {
    fn id(&self) -> &SessionId;

    /// Enqueue one frame for delivery. Must never block on transport I/O;
    /// actual writes happen on the session's own writer task.
    fn push(&self, path: &SyncPath, payload: String) -> Result<(), TransportError>;

    /// Register a callback for when the transport drops the session.
    /// Registering on an already-removed session invokes the callback at
    /// once, so a removal racing the registration cannot be lost.
    fn on_removed(&self, callback: RemovalCallback);
}

/// Tracks the single live client session.
///
/// At most one session is tracked at a time; installing a new one hands the
/// displaced session back to the caller so the transport can remove it.
#[derive(Default)]
pub struct SessionSlot {
    current: Mutex<Option<Arc<dyn SessionHandle>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a session, returning the one it displaced, if any.
    pub fn install(&self, session: Arc<dyn SessionHandle>) -> Option<Arc<dyn SessionHandle>> {
        self.current.lock().replace(session)
    }

    /// Clear the slot if it still holds `id`. Returns whether it did; a
    /// stale clear for an already-replaced session is a no-op.
    pub fn clear(&self, id: &SessionId) -> bool {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(session) if session.id() == id => {
                *current = None;
                true
            }
            _ => false,
        }
    }

    /// The live session, if a client is attached.
    pub fn current(&self) -> Option<Arc<dyn SessionHandle>> {
        self.current.lock().clone()
    }
}
