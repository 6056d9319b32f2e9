//! The single delegation boundary for outbound sync traffic.
//!
//! Every producer — the periodic scheduler, the event trigger, the
//! connection lifecycle tracker — hands its update to one `SyncStrategy`
//! call. Ordering on the wire equals the order producers invoke it; nothing
//! here buffers or coalesces.

use std::sync::Arc;

use uplink_core::errors::SyncError;
use uplink_core::events::{SyncFrame, SyncOp, SyncPath};
use uplink_core::transport::SessionHandle;

/// Delivers one update to the connected client.
///
/// Safe to invoke concurrently from the timer task, the transport dispatch
/// task, and arbitrary producer tasks. Failures are handled here and never
/// reach the caller.
pub trait SyncStrategy: Send + Sync {
    /// Push `(op, path, value)` to the given session. A `None` session makes
    /// the call a logged no-op; the engine never waits for one to appear.
    fn sync(
        &self,
        session: Option<&Arc<dyn SessionHandle>>,
        op: SyncOp,
        path: &SyncPath,
        value: &serde_json::Value,
    );
}

/// Strategy that encodes one JSON frame per call and enqueues it on the
/// session's outbound channel. Producers never wait on transport I/O; the
/// session's writer task serializes the actual writes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelSyncStrategy;

impl ChannelSyncStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SyncStrategy for ChannelSyncStrategy {
    fn sync(
        &self,
        session: Option<&Arc<dyn SessionHandle>>,
        op: SyncOp,
        path: &SyncPath,
        value: &serde_json::Value,
    ) {
        let Some(session) = session else {
            tracing::debug!(op = op.as_str(), path = path.as_str(), "No client session, dropping sync");
            return;
        };

        let frame = SyncFrame::new(op, path.clone(), value.clone());
        let payload = match frame.to_json() {
            Ok(payload) => payload,
            Err(source) => {
                let err = SyncError::Serialization {
                    op,
                    path: path.as_str().to_string(),
                    source,
                };
                tracing::warn!(error = %err, kind = err.kind(), "Dropping sync frame");
                return;
            }
        };

        match session.push(path, payload) {
            Ok(()) => {
                tracing::trace!(
                    session = %session.id(),
                    op = op.as_str(),
                    path = path.as_str(),
                    "Pushed sync frame"
                );
            }
            Err(transport_err) => {
                let err = SyncError::TransportUnavailable(transport_err);
                tracing::warn!(
                    session = %session.id(),
                    op = op.as_str(),
                    path = path.as_str(),
                    error = %err,
                    kind = err.kind(),
                    "Failed to push sync frame"
                );
            }
        }
    }
}
