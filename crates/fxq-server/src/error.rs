//! Server error types.

use thiserror::Error;

/// Rejected downstream control message.
///
/// The `Display` text is exactly what the client receives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A ticker in a SUBSCRIBE request was empty or null.
    #[error("Invalid params")]
    InvalidParams,

    #[error("Unknown method")]
    UnknownMethod(String),

    /// Unparseable payload or missing required field.
    #[error("Invalid message format")]
    InvalidMessage(String),
}

/// Failure delivering one message to one downstream connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The client's queue is full (slow consumer); the message is dropped.
    #[error("client queue full")]
    Full,

    /// The client's writer is gone.
    #[error("client connection closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid listen address {0:?}")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
