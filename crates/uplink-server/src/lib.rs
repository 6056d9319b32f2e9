pub mod channels;
pub mod server;
pub mod session;

pub use channels::{ChannelRegistry, SYNC_CHANNEL};
pub use server::{start, ServerConfig, ServerHandle};
pub use session::ChannelSession;
