use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operation kinds carried by a sync update.
///
/// A closed set: the wire format rejects unknown operations at decode time
/// instead of silently dropping them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncOp {
    /// Apply or merge a value at a path.
    Add,
    /// Drop the value at a path.
    Remove,
    /// Liveness probe with an empty payload.
    Ping,
}

impl SyncOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Ping => "ping",
        }
    }
}

impl fmt::Display for SyncOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location within the state tree.
///
/// The well-known paths are the ones the engine itself addresses; everything
/// else arrives as a validated free-form path on externally produced events.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SyncPath {
    /// The entire state tree.
    All,
    /// The peer collection.
    Peers,
    /// Instance statistics.
    InstanceStats,
    /// Liveness probe channel.
    Ping,
    /// Free-form location named by an external producer.
    Custom(String),
}

/// Rejection reasons for free-form paths.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    #[error("sync path is empty")]
    Empty,
    #[error("sync path {path:?} contains illegal character {ch:?}")]
    IllegalChar { path: String, ch: char },
}

impl SyncPath {
    /// Parse a path string, mapping well-known names to their variants and
    /// validating anything else.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        match s {
            "all" => Ok(Self::All),
            "peers" => Ok(Self::Peers),
            "instanceStats" => Ok(Self::InstanceStats),
            "ping" => Ok(Self::Ping),
            other => {
                if other.is_empty() {
                    return Err(PathError::Empty);
                }
                if let Some(ch) = other.chars().find(|c| c.is_whitespace() || c.is_control()) {
                    return Err(PathError::IllegalChar {
                        path: other.to_string(),
                        ch,
                    });
                }
                Ok(Self::Custom(other.to_string()))
            }
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Peers => "peers",
            Self::InstanceStats => "instanceStats",
            Self::Ping => "ping",
            Self::Custom(path) => path,
        }
    }
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncPath {
    type Err = PathError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SyncPath {
    type Error = PathError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<SyncPath> for String {
    fn from(path: SyncPath) -> Self {
        path.as_str().to_string()
    }
}

/// Notification that part of the state tree changed and the client should be
/// told. Published on the event bus by whichever subsystem mutated the state;
/// consumed exactly once per event by the sync engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncEvent {
    pub op: SyncOp,
    pub path: SyncPath,
    pub value: serde_json::Value,
}

impl SyncEvent {
    pub fn new(op: SyncOp, path: SyncPath, value: serde_json::Value) -> Self {
        Self { op, path, value }
    }

    /// Convenience for the common apply/merge case.
    pub fn add(path: SyncPath, value: serde_json::Value) -> Self {
        Self::new(SyncOp::Add, path, value)
    }
}

/// Announcement that the frontend has received its first full state push and
/// is usable. Fire-and-forget; interested subsystems subscribe on the bus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UiLoadedEvent;

/// The frame pushed to the client over the sync channel, as JSON text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncFrame {
    pub op: SyncOp,
    pub path: SyncPath,
    pub value: serde_json::Value,
}

impl SyncFrame {
    pub fn new(op: SyncOp, path: SyncPath, value: serde_json::Value) -> Self {
        Self { op, path, value }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
