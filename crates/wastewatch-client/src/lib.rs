pub mod notify;
pub mod router;
pub mod state;
pub mod transport;

pub use notify::{DesktopNotification, NotificationBackend, NotificationPresenter, Permission};
pub use router::{EventKind, EventRouter};
pub use state::ClientState;
pub use transport::{ConnectionStatus, RoomHandle, Transport, TransportConfig, TransportError};
