//! UDP connection to the game server
//!
//! Owns the socket and everything the outbound path needs:
//! - transport framing with the current peer id and channel
//! - RELIABLE sequence numbering (fire-and-forget, no retransmission)
//! - the handshake gate released by the receive loop
//!
//! Sends never wait for the server. They are safe to call from any task
//! while the background receive loop runs.

use crate::config::{bounded, resolve, ClientConfig};
use crate::error::{ClientError, ClientResult};
use crate::handshake::{Handshake, HandshakeState};
use crate::receiver;
use bytes::Bytes;
use log::{debug, info, warn};
use protocol::packet::{frame, PEER_ID_UNASSIGNED};
use protocol::{ClientCommand, Codec, Control, Packet, ReliableState};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Priority channel. The server only ever uses channel 0.
pub const CHANNEL: u8 = 0;

/// Decoded application payloads plus the task producing them.
pub(crate) struct Inbound {
    pub(crate) queue: mpsc::UnboundedReceiver<Bytes>,
    pub(crate) task: JoinHandle<()>,
}

pub struct Connection {
    socket: UdpSocket,
    server_addr: SocketAddr,
    peer_id: AtomicU16,
    channel: u8,
    reliable: ReliableState,
    codec: Codec,
    handshake: Handshake,
}

impl Connection {
    /// Opens the socket, runs the handshake and starts the receive loop.
    ///
    /// Blocks until the server assigns a peer id or denies access. Without a
    /// configured timeout an unresponsive server blocks forever.
    pub(crate) async fn connect(
        config: &ClientConfig,
        codec: Codec,
    ) -> ClientResult<(Arc<Connection>, Inbound)> {
        let server_addr = resolve(&config.server).await?;
        let bind_addr = if server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        info!(
            "Connecting to {} from {} as {}",
            server_addr,
            socket.local_addr()?,
            config.username
        );

        let (handshake, outcome) = Handshake::new();
        let connection = Arc::new(Connection {
            socket,
            server_addr,
            peer_id: AtomicU16::new(PEER_ID_UNASSIGNED),
            channel: CHANNEL,
            reliable: ReliableState::new(),
            codec,
            handshake,
        });

        // INIT goes first, then an empty reliable packet opens the sequence
        // window, the same order the official client uses.
        connection
            .send_command(&ClientCommand::Init {
                username: config.username.clone(),
            })
            .await?;
        connection
            .send_reliable(Packet::original(Bytes::new()))
            .await?;

        let (tx, queue) = mpsc::unbounded_channel();
        let task = receiver::spawn(Arc::clone(&connection), tx);

        let result = match bounded(config.handshake_timeout, outcome).await {
            Ok(Ok(Ok(peer_id))) => {
                info!("Handshake complete, peer id {}", peer_id);
                Ok(())
            }
            Ok(Ok(Err(reason))) => Err(ClientError::AccessDenied { reason }),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok((connection, Inbound { queue, task })),
            Err(e) => {
                warn!("Handshake failed: {}", e);
                task.abort();
                Err(e)
            }
        }
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn local_addr(&self) -> ClientResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Our peer id, 0 until the server assigns one.
    pub fn peer_id(&self) -> u16 {
        self.peer_id.load(Ordering::SeqCst)
    }

    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state()
    }

    /// Sequence number the next reliable send will carry.
    pub fn next_seq(&self) -> u16 {
        self.reliable.peek_seq()
    }

    pub fn last_acked(&self) -> u16 {
        self.reliable.last_acked()
    }

    pub(crate) fn codec(&self) -> &Codec {
        &self.codec
    }

    pub(crate) fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    pub(crate) fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Frames and transmits a packet as is.
    pub(crate) async fn send_raw(&self, packet: &Packet) -> ClientResult<()> {
        let body = packet.encode(&self.codec)?;
        let datagram = frame(&self.codec, self.peer_id(), self.channel, &body)?;
        self.socket.send_to(&datagram, self.server_addr).await?;
        Ok(())
    }

    /// Wraps `inner` in a RELIABLE envelope with the next sequence number.
    pub async fn send_reliable(&self, inner: Packet) -> ClientResult<u16> {
        let seq = self.reliable.next_seq();
        self.send_raw(&Packet::reliable(seq, inner)).await?;
        Ok(seq)
    }

    /// Sends an application command reliably.
    pub async fn send_command(&self, command: &ClientCommand) -> ClientResult<u16> {
        let payload = command.encode(&self.codec)?;
        let seq = self.send_reliable(Packet::original(payload)).await?;
        debug!("Sent command {:#06x} as seq {}", command.command_id(), seq);
        Ok(seq)
    }

    pub(crate) async fn ack(&self, seq: u16) -> ClientResult<()> {
        self.send_raw(&Packet::Control(Control::Ack(seq))).await
    }

    pub(crate) fn record_ack(&self, seq: u16) {
        self.reliable.record_ack(seq);
    }

    /// Takes the server-assigned peer id, answers with INIT2 and releases
    /// the handshake waiter. Repeated assignments are ignored.
    pub(crate) async fn on_peer_assigned(&self, peer_id: u16) -> ClientResult<()> {
        if !self.handshake.begin_assignment() {
            warn!("Ignoring peer id assignment {} in state {:?}", peer_id, self.handshake.state());
            return Ok(());
        }

        self.peer_id.store(peer_id, Ordering::SeqCst);
        info!("Assigned peer id {}", peer_id);

        self.send_command(&ClientCommand::Init2).await?;
        self.handshake.complete(peer_id);
        Ok(())
    }

    /// Tells the server we are leaving. The character is removed from the
    /// world; the background tasks keep running until dropped.
    pub async fn disconnect(&self) -> ClientResult<()> {
        info!("Disconnecting from {}", self.server_addr);
        self.send_raw(&Packet::Control(Control::Disco)).await
    }
}
