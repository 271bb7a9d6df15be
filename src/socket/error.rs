use thiserror::Error;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("Socket is closed")]
    SocketClosed,
    #[error("Invalid signaling URL: {0}")]
    InvalidUrl(String),
    #[error("WebSocket error: {0}")]
    WebSocket(String),
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SocketError>;
