pub mod bus;
pub mod errors;
pub mod events;
pub mod ids;
pub mod model;
pub mod transport;

pub use bus::EventBus;
pub use errors::{SyncError, TransportError};
pub use events::{PathError, SyncEvent, SyncFrame, SyncOp, SyncPath, UiLoadedEvent};
pub use ids::SessionId;
pub use model::{MemoryModel, StateModel};
pub use transport::{RemovalCallback, SessionHandle, SessionSlot};
