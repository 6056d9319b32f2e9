//! Read-only view of the application state pushed to the client.

use parking_lot::RwLock;
use serde_json::Value;

/// The state the backend considers authoritative.
///
/// The sync engine treats the model as opaque JSON. Every accessor must
/// re-read live state at call time; callers never cache a snapshot.
pub trait StateModel: Send + Sync {
    /// The entire state tree, for the post-connect full sync.
    fn all(&self) -> Value;
    /// The current peer collection.
    fn peers(&self) -> Value;
    /// The current instance statistics.
    fn instance_stats(&self) -> Value;
}

/// Lock-protected in-memory model for the binary and for tests.
///
/// The tree is a JSON object whose `peers` and `instanceStats` keys back the
/// delta accessors.
pub struct MemoryModel {
    state: RwLock<Value>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(serde_json::json!({
                "peers": [],
                "instanceStats": {},
            })),
        }
    }

    /// Replace the value at a top-level key.
    pub fn set(&self, key: &str, value: Value) {
        let mut state = self.state.write();
        if let Some(obj) = state.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
    }

    /// Mutate the whole tree in place.
    pub fn update(&self, f: impl FnOnce(&mut Value)) {
        let mut state = self.state.write();
        f(&mut state);
    }
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

impl StateModel for MemoryModel {
    fn all(&self) -> Value {
        self.state.read().clone()
    }

    fn peers(&self) -> Value {
        self.state
            .read()
            .get("peers")
            .cloned()
            .unwrap_or(Value::Array(Vec::new()))
    }

    fn instance_stats(&self) -> Value {
        self.state
            .read()
            .get("instanceStats")
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_model_has_empty_collections() {
        let model = MemoryModel::new();
        assert_eq!(model.peers(), serde_json::json!([]));
        assert_eq!(model.instance_stats(), serde_json::json!({}));
    }

    #[test]
    fn accessors_reread_live_state() {
        let model = MemoryModel::new();
        let before = model.peers();

        model.set("peers", serde_json::json!([{"id": "p1"}]));

        let after = model.peers();
        assert_ne!(before, after);
        assert_eq!(after, serde_json::json!([{"id": "p1"}]));
    }

    #[test]
    fn all_reflects_every_key() {
        let model = MemoryModel::new();
        model.set("instanceStats", serde_json::json!({"uptime": 12}));
        model.set("mode", serde_json::json!("give"));

        let all = model.all();
        assert_eq!(all["instanceStats"]["uptime"], 12);
        assert_eq!(all["mode"], "give");
    }

    #[test]
    fn update_mutates_in_place() {
        let model = MemoryModel::new();
        model.update(|state| {
            state["peers"] = serde_json::json!(["a", "b"]);
        });
        assert_eq!(model.peers(), serde_json::json!(["a", "b"]));
    }
}
