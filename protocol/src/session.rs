//! Inbound protocol processing without I/O
//!
//! A [`Session`] turns one raw datagram into an ordered list of [`Event`]s
//! for the socket owner to act on. Ordering matters: a RELIABLE envelope
//! yields its `SendAck` before anything produced by the packet it wraps, so
//! the ack always leaves before the inner payload is dispatched.
//!
//! The session never touches connection state itself. A datagram that fails
//! validation produces an error and no events.

use crate::codec::Codec;
use crate::error::Result;
use crate::packet::{unframe, Control, Packet};
use crate::split::SplitReassembler;
use bytes::Bytes;
use log::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A RELIABLE packet arrived and must be acknowledged
    SendAck(u16),
    /// The server acknowledged one of our reliable packets
    Acked(u16),
    /// The server assigned our peer id
    PeerAssigned(u16),
    Ping,
    /// The server closed the session
    Disconnected,
    /// A complete application payload, starting with its command id
    Deliver(Bytes),
}

#[derive(Debug, Default)]
pub struct Session {
    codec: Codec,
    splits: SplitReassembler,
}

impl Session {
    pub fn new(codec: Codec) -> Self {
        Self {
            codec,
            splits: SplitReassembler::new(),
        }
    }

    pub fn handle_datagram(&mut self, datagram: Bytes) -> Result<Vec<Event>> {
        let (_, body) = unframe(&self.codec, datagram)?;
        let packet = Packet::parse(&self.codec, body)?;

        let mut events = Vec::new();
        self.process(packet, &mut events)?;
        Ok(events)
    }

    fn process(&mut self, packet: Packet, events: &mut Vec<Event>) -> Result<()> {
        match packet {
            Packet::Control(Control::Ack(seq)) => events.push(Event::Acked(seq)),
            Packet::Control(Control::SetPeerId(peer_id)) => {
                events.push(Event::PeerAssigned(peer_id))
            }
            // Pings arrive inside RELIABLE, so the ack already answered them.
            Packet::Control(Control::Ping) => events.push(Event::Ping),
            Packet::Control(Control::Disco) => events.push(Event::Disconnected),
            Packet::Original(payload) => events.push(Event::Deliver(payload)),
            Packet::Split {
                seq,
                chunk_count,
                chunk_index,
                data,
            } => {
                debug!("Split {} chunk {}/{}", seq, chunk_index + 1, chunk_count);
                if let Some(payload) = self.splits.insert(seq, chunk_count, chunk_index, data)? {
                    events.push(Event::Deliver(payload));
                }
            }
            Packet::Reliable { seq, inner } => {
                events.push(Event::SendAck(seq));
                // The envelope was valid, so the ack stands even if its
                // contents are not.
                if let Err(e) = self.process(*inner, events) {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!("Dropping contents of reliable packet {}: {}", seq, e);
                }
            }
        }
        Ok(())
    }

    pub fn pending_splits(&self) -> usize {
        self.splits.pending()
    }
}
