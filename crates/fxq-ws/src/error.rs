//! Feed client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WsError {
    /// Transport-level connect failure, or the reconnect circuit breaker tripped.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// Subscribe attempted while the upstream link is down.
    #[error("Not connected to upstream feed")]
    NotConnected,

    /// Inbound frame that does not match the quote schema.
    #[error("Invalid quote: {0}")]
    InvalidQuote(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type WsResult<T> = Result<T, WsError>;
