//! Error types for wire-level encoding and decoding

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not enough bytes left to decode a declared field
    #[error("truncated field `{field}`: need {needed} bytes, {available} available")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// A value does not match the type declared for its field
    #[error("value for field `{0}` does not match its declared type")]
    FieldMismatch(&'static str),

    #[error("field `{field}` holds {len} bytes but is fixed at {width}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        width: usize,
    },

    #[error("unexpected protocol id {0:#010x}")]
    ProtocolMismatch(u32),

    #[error("unexpected sender peer id {0}, expected the server's id 1")]
    PeerMismatch(u16),

    #[error("unknown packet type {0:#04x}")]
    UnknownPacketType(u8),

    #[error("unknown control type {0:#04x}")]
    UnknownControlType(u8),

    #[error("split chunk {index} out of range for {count} chunks")]
    MalformedSplit { count: u16, index: u16 },

    #[error("invalid UTF-16 text in `{0}`")]
    InvalidText(&'static str),
}

impl ProtocolError {
    /// Framing-level failures leave the connection in an unknown state and
    /// terminate the receive task. Everything else only spoils one datagram.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProtocolError::ProtocolMismatch(_)
                | ProtocolError::PeerMismatch(_)
                | ProtocolError::UnknownPacketType(_)
                | ProtocolError::UnknownControlType(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
