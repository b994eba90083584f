//! # parley-client
//!
//! The client-side session engine: typed REST access to the daemon,
//! the pagination window over stored logs, the viewport scroll policy,
//! and the session that reconciles sends with their echoes on the live
//! WebSocket feed.

pub mod api;
pub mod config;
pub mod scroll;
pub mod session;
pub mod window;

mod error;

pub use api::{ApiClient, DaemonStatus};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use scroll::{ScrollAnchor, ViewportMetrics};
pub use session::{ChatSession, ChatTarget, SessionEvent};
pub use window::{ChatWindows, WindowView};
