use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetError>;

/// Errors surfaced by the connection layer. Runtime socket failures are
/// not errors here; the supervisor absorbs them and reconnects.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("invalid WebSocket URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
