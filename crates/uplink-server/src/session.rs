//! Per-connection push session.
//!
//! Each WebSocket connection gets a `ChannelSession`: a bounded outbound
//! queue drained by the connection's writer task, pong-based liveness, and
//! removal callbacks for the sync engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use uplink_core::errors::TransportError;
use uplink_core::events::SyncPath;
use uplink_core::ids::SessionId;
use uplink_core::transport::{RemovalCallback, SessionHandle};

enum Removal {
    Live(Vec<RemovalCallback>),
    Removed { was_timeout: bool },
}

/// One connected client's transport session.
pub struct ChannelSession {
    id: SessionId,
    tx: mpsc::Sender<String>,
    removal: Mutex<Removal>,
    last_pong: AtomicU64,
}

impl ChannelSession {
    /// Create a session with a bounded outbound queue. The receiver side
    /// belongs to the connection's writer task.
    pub fn new(max_send_queue: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(max_send_queue);
        let session = Arc::new(Self {
            id: SessionId::new(),
            tx,
            removal: Mutex::new(Removal::Live(Vec::new())),
            last_pong: AtomicU64::new(now_secs()),
        });
        (session, rx)
    }

    pub fn record_pong(&self) {
        self.last_pong.store(now_secs(), Ordering::Relaxed);
    }

    /// Whether a pong arrived within the timeout window.
    pub fn is_alive(&self, timeout: Duration) -> bool {
        let last = self.last_pong.load(Ordering::Relaxed);
        now_secs().saturating_sub(last) < timeout.as_secs()
    }

    pub fn is_removed(&self) -> bool {
        matches!(&*self.removal.lock(), Removal::Removed { .. })
    }

    /// Report the session gone and fire removal callbacks. Idempotent: the
    /// callbacks run exactly once, on the first call.
    pub fn notify_removed(&self, was_timeout: bool) {
        let callbacks = {
            let mut removal = self.removal.lock();
            match std::mem::replace(&mut *removal, Removal::Removed { was_timeout }) {
                Removal::Live(callbacks) => callbacks,
                already_removed => {
                    *removal = already_removed;
                    return;
                }
            }
        };
        tracing::debug!(session = %self.id, was_timeout, "Session removed");
        for callback in callbacks {
            callback(was_timeout);
        }
    }
}

impl SessionHandle for ChannelSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    fn push(&self, path: &SyncPath, payload: String) -> Result<(), TransportError> {
        if self.is_removed() {
            return Err(TransportError::SessionClosed);
        }
        match self.tx.try_send(payload) {
            Ok(()) => {
                tracing::trace!(session = %self.id, path = path.as_str(), "Frame queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(TransportError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(TransportError::SessionClosed),
        }
    }

    fn on_removed(&self, callback: RemovalCallback) {
        let mut removal = self.removal.lock();
        match &mut *removal {
            Removal::Live(callbacks) => callbacks.push(callback),
            Removal::Removed { was_timeout } => {
                let was_timeout = *was_timeout;
                drop(removal);
                callback(was_timeout);
            }
        }
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
