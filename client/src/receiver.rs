//! Background receive loop
//!
//! Reads one datagram at a time, runs it through the protocol session and
//! acts on the resulting events in order: acks go out before the payload
//! they cover is queued for dispatch.
//!
//! Framing-level errors end the loop. A datagram that merely fails to decode
//! is dropped with a warning.

use crate::connection::Connection;
use crate::error::ClientResult;
use bytes::Bytes;
use log::{debug, error, info, warn};
use protocol::commands::toclient;
use protocol::messages::peek_command_id;
use protocol::{Event, ServerCommand, Session};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const RECV_BUFFER_SIZE: usize = 2048;

pub(crate) fn spawn(
    connection: Arc<Connection>,
    queue: mpsc::UnboundedSender<Bytes>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match run(&connection, &queue).await {
            Ok(()) => info!("Receive loop finished"),
            Err(e) => error!("Receive loop aborted: {}", e),
        }
        connection.handshake().abandon();
    })
}

async fn run(connection: &Connection, queue: &mpsc::UnboundedSender<Bytes>) -> ClientResult<()> {
    let mut session = Session::new(connection.codec().clone());
    let mut buffer = [0u8; RECV_BUFFER_SIZE];

    loop {
        let (len, origin) = connection.socket().recv_from(&mut buffer).await?;
        if fills_buffer(len) {
            warn!(
                "Datagram from {} filled the {} byte buffer and may be cut off",
                origin, RECV_BUFFER_SIZE
            );
        }

        let events = match session.handle_datagram(Bytes::copy_from_slice(&buffer[..len])) {
            Ok(events) => events,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!("Dropping datagram from {}: {}", origin, e);
                continue;
            }
        };

        for event in events {
            match event {
                Event::SendAck(seq) => connection.ack(seq).await?,
                Event::Acked(seq) => connection.record_ack(seq),
                Event::PeerAssigned(peer_id) => connection.on_peer_assigned(peer_id).await?,
                Event::Ping => debug!("Ping from {}", origin),
                Event::Disconnected => {
                    info!("Server closed the connection");
                    return Ok(());
                }
                Event::Deliver(payload) => {
                    if connection.handshake().is_pending() {
                        reject_if_denied(connection, &payload);
                    }
                    if queue.send(payload).is_err() {
                        debug!("Dispatch queue closed, stopping");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// A datagram that used the whole buffer was probably longer and got cut.
fn fills_buffer(len: usize) -> bool {
    len >= RECV_BUFFER_SIZE
}

/// ACCESS_DENIED before a peer id was assigned fails the handshake.
fn reject_if_denied(connection: &Connection, payload: &Bytes) {
    if peek_command_id(payload) != Some(toclient::ACCESS_DENIED) {
        return;
    }

    let reason = match ServerCommand::decode(connection.codec(), payload.clone()) {
        Ok(ServerCommand::AccessDenied { reason }) => reason,
        Ok(_) | Err(_) => String::from("no reason given"),
    };
    warn!("Access denied during handshake: {}", reason);
    connection.handshake().reject(reason);
}
