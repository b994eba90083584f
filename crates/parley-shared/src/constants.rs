//! Protocol-wide constants shared by every Parley crate.

/// Delay between reconnect attempts after the WebSocket closes, in seconds.
/// The delay is fixed; there is no backoff.
pub const RECONNECT_DELAY_SECS: u64 = 5;

/// Number of most-recent messages revealed when a chat is first opened.
pub const INITIAL_PAGE_SIZE: usize = 10;

/// Number of additional older messages revealed per load-older request.
pub const PAGE_INCREMENT: usize = 10;

/// Distance from the bottom of the viewport, in pixels, within which a
/// live append still auto-scrolls to the newest message.
pub const AUTO_SCROLL_THRESHOLD_PX: f64 = 100.0;

/// Largest outbound frame the daemon will accept. Oversized frames make
/// the daemon drop the whole connection, so we refuse them client-side.
pub const MAX_FRAME_SIZE: usize = 4096;

/// Default base URL of the daemon's REST API.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:59578/api";

/// Default URL of the daemon's WebSocket endpoint.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:59578/api/ws";
