use thiserror::Error;

/// Errors produced while encoding or decoding daemon payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
