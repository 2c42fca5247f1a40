pub mod broadcast;
pub mod registry;
pub mod rooms;
pub mod server;
pub mod wire;

pub use broadcast::BroadcastHub;
pub use registry::ConnectionRegistry;
pub use rooms::RoomRegistry;
pub use server::{start, ServerConfig, ServerHandle};
