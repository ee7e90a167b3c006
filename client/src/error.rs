//! Client-side error type

use protocol::ProtocolError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The server refused the connection before it became ready
    #[error("Access denied. Reason: {reason}")]
    AccessDenied { reason: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Handshake timed out")]
    HandshakeTimeout,
}

pub type ClientResult<T> = Result<T, ClientError>;
