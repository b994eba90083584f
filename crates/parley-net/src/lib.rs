// WebSocket connectivity to the local daemon: a supervised connection
// task, lifecycle state, and inbound frame fan-out.

pub mod connection;
pub mod listeners;

mod error;

pub use connection::{spawn_connection, ConnectionConfig, ConnectionHandle, ConnectionState};
pub use error::{NetError, Result};
pub use listeners::ListenerGuard;
