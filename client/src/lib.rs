//! # Game Client Library
//!
//! Client side of the game server's UDP protocol: connect, complete the
//! handshake, keep the link alive with acknowledgements and drive a single
//! character through chat and movement commands.
//!
//! ## Architecture Overview
//!
//! Two background tasks run for every connected client:
//!
//! ### Receive Loop
//! Reads datagrams, strips and validates the transport header, unwraps
//! RELIABLE and SPLIT envelopes and acknowledges every reliable packet
//! before anything else happens with it. Complete application payloads are
//! queued for dispatch in the order they were reassembled.
//!
//! ### Dispatch Loop
//! Decodes queued payloads into server commands and applies them to the
//! local player state: position updates, HP, chat callbacks and the
//! automatic respawn after death.
//!
//! The public API sends commands from the caller's task. Sends are
//! fire-and-forget: nothing is retransmitted and nothing waits for an ack.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! - Connection parameters and builder methods
//! - Address parsing and resolution
//!
//! ### Connection Module (`connection`)
//! - UDP socket ownership and transport framing
//! - Reliable sequence numbering
//! - The INIT / SET_PEER_ID / INIT2 handshake
//!
//! ### Network Module (`network`)
//! - [`Client`], the command API
//! - Server command dispatch
//!
//! ### Game Module (`game`)
//! - Position, view angle and HP of the local character
//! - Relative movement arithmetic
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::{Client, ClientConfig, Position, Angle};
//!
//! # async fn run() -> Result<(), client::ClientError> {
//! let config = ClientConfig::new("localhost:30000", "user")
//!     .with_on_message(|message| println!("{}", message));
//! let client = Client::connect(config).await?;
//!
//! client.say("hello").await?;
//! client.turn(90.0).await?;
//! client.walk(3.0).await?;
//! client.move_by(Position::new(0.0, 1.0, 0.0), Angle::default()).await?;
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod handshake;
pub mod network;
pub mod trace;

mod receiver;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use game::{Angle, PlayerState, Position};
pub use handshake::HandshakeState;
pub use network::Client;
