use crate::events::SyncOp;

/// Errors recovered at the sync delegation boundary.
///
/// None of these propagate to the producers (scheduler tick, event trigger,
/// lifecycle tracker): the individual attempt is logged and dropped, and
/// later syncs proceed unaffected.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// No live session, or the transport refused the frame.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[from] TransportError),

    /// The value could not be encoded for the wire.
    #[error("failed to encode {op} frame for {path}: {source}")]
    Serialization {
        op: SyncOp,
        path: String,
        source: serde_json::Error,
    },

    /// No timer facility is available; periodic sync stays off.
    #[error("no timer facility available")]
    SchedulerUnavailable,
}

impl SyncError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TransportUnavailable(_) => "transport_unavailable",
            Self::Serialization { .. } => "serialization",
            Self::SchedulerUnavailable => "scheduler_unavailable",
        }
    }
}

/// Failures reported by a session's push channel.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransportError {
    /// The session was removed or its connection is gone.
    #[error("session closed")]
    SessionClosed,

    /// The outbound queue is full; the frame was dropped.
    #[error("send queue full")]
    QueueFull,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings() {
        assert_eq!(
            SyncError::TransportUnavailable(TransportError::SessionClosed).kind(),
            "transport_unavailable"
        );
        assert_eq!(SyncError::SchedulerUnavailable.kind(), "scheduler_unavailable");
    }

    #[test]
    fn transport_error_converts() {
        let err: SyncError = TransportError::QueueFull.into();
        assert!(matches!(
            err,
            SyncError::TransportUnavailable(TransportError::QueueFull)
        ));
    }

    #[test]
    fn display_includes_context() {
        let source = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = SyncError::Serialization {
            op: SyncOp::Add,
            path: "peers".into(),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("add"), "got: {msg}");
        assert!(msg.contains("peers"), "got: {msg}");
    }
}
