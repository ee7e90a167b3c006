//! # Wire Protocol Library
//!
//! Socket-free building blocks of the game server's UDP protocol. Everything
//! here is a pure transformation between bytes and typed values, so it can be
//! exercised without a network.
//!
//! ## Layers
//!
//! ### Codec (`codec`)
//! Fixed-width big-endian fields described by explicit (type, value) lists,
//! with an optional trace hook observing every field.
//!
//! ### Framing and envelopes (`packet`)
//! - Transport header: protocol id, sender peer id, channel
//! - CONTROL / ORIGINAL / SPLIT / RELIABLE envelopes, nested recursively
//!
//! ### Reliable channel bookkeeping (`reliable`)
//! Outbound sequence numbering (starting at 0xFFDC, wrapping at 2^16) and the
//! last acknowledged sequence. There is no retransmission.
//!
//! ### Split reassembly (`split`)
//! Buffers SPLIT fragments per sequence number and emits each message once.
//!
//! ### Inbound session (`session`)
//! Turns a datagram into ordered events: acks to send, peer id assignment,
//! delivered application payloads.
//!
//! ### Commands (`commands`, `messages`)
//! Process-wide command id tables and typed encoders/decoders for the
//! commands the client implements.

pub mod codec;
pub mod commands;
pub mod error;
pub mod messages;
pub mod packet;
pub mod reliable;
pub mod session;
pub mod split;

pub use codec::{Codec, Field, FieldType, TraceHook, Value};
pub use error::{ProtocolError, Result};
pub use messages::{ClientCommand, ServerCommand};
pub use packet::{Control, Packet, PROTOCOL_ID, SERVER_PEER_ID};
pub use reliable::{ReliableState, SEQNUM_INITIAL};
pub use session::{Event, Session};
pub use split::SplitReassembler;

/// Port the server listens on when none is given.
pub const DEFAULT_PORT: u16 = 30000;
