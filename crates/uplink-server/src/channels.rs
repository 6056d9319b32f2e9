//! Named channel registry.
//!
//! Clients may only subscribe to registered channels. A persistent channel
//! survives reconnects: a client that re-attaches subscribes again and picks
//! up where it left off, instead of the channel being torn down with the
//! connection.

use dashmap::DashMap;

/// The channel carrying state sync frames.
pub const SYNC_CHANNEL: &str = "sync";

#[derive(Clone, Copy, Debug, Default)]
struct ChannelConfig {
    persistent: bool,
}

/// Registry of channels clients may subscribe to.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, ChannelConfig>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel torn down with its connection.
    pub fn register(&self, name: &str) {
        self.channels
            .insert(name.to_string(), ChannelConfig { persistent: false });
    }

    /// Register a channel that survives reconnects.
    pub fn register_persistent(&self, name: &str) {
        self.channels
            .insert(name.to_string(), ChannelConfig { persistent: true });
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn is_persistent(&self, name: &str) -> bool {
        self.channels
            .get(name)
            .map(|config| config.persistent)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_channel_is_unknown() {
        let registry = ChannelRegistry::new();
        assert!(!registry.is_registered("sync"));
        assert!(!registry.is_persistent("sync"));
    }

    #[test]
    fn registered_channel_is_known() {
        let registry = ChannelRegistry::new();
        registry.register("events");
        assert!(registry.is_registered("events"));
        assert!(!registry.is_persistent("events"));
    }

    #[test]
    fn persistent_channel_is_flagged() {
        let registry = ChannelRegistry::new();
        registry.register_persistent(SYNC_CHANNEL);
        assert!(registry.is_registered(SYNC_CHANNEL));
        assert!(registry.is_persistent(SYNC_CHANNEL));
    }
}
