//! Client configuration loaded from environment variables.
//!
//! Everything defaults to the daemon's local endpoints, so a client on
//! the same machine runs with zero configuration.

use tracing::warn;

use parley_shared::constants::{DEFAULT_API_URL, DEFAULT_WS_URL};

/// Runtime configuration for the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the daemon's REST API.
    /// Env: `PARLEY_API_URL`
    /// Default: `http://127.0.0.1:59578/api`
    pub api_url: String,

    /// URL of the daemon's WebSocket endpoint.
    /// Env: `PARLEY_WS_URL`
    /// Default: `ws://127.0.0.1:59578/api/ws`
    pub ws_url: String,

    /// Local peer id. When unset, the client asks the daemon's status
    /// endpoint for it.
    /// Env: `PARLEY_PEER_ID`
    /// Default: none
    pub peer_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            peer_id: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or invalid.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("PARLEY_API_URL") {
            if url::Url::parse(&value).is_ok() {
                config.api_url = value;
            } else {
                warn!(value = %value, "Invalid PARLEY_API_URL, using default");
            }
        }

        if let Ok(value) = std::env::var("PARLEY_WS_URL") {
            if url::Url::parse(&value).is_ok() {
                config.ws_url = value;
            } else {
                warn!(value = %value, "Invalid PARLEY_WS_URL, using default");
            }
        }

        if let Ok(value) = std::env::var("PARLEY_PEER_ID") {
            if !value.trim().is_empty() {
                config.peer_id = Some(value.trim().to_string());
            }
        }

        config
    }
}
