use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client layer.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("daemon returned status {status}")]
    Daemon { status: u16 },

    #[error("network error: {0}")]
    Net(#[from] parley_net::NetError),

    #[error("local identity unavailable: {0}")]
    Identity(String),
}
