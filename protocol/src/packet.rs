//! Transport framing and packet envelopes
//!
//! Every datagram starts with a 7-byte transport header:
//! - protocol id (u32, always [`PROTOCOL_ID`])
//! - sender peer id (u16)
//! - channel (u8, always 0 for this client)
//!
//! The body that follows is a packet envelope selected by a 1-byte type tag:
//! - CONTROL: connection housekeeping (ack, peer id assignment, ping, disco)
//! - ORIGINAL: an application command, passed upwards untouched
//! - SPLIT: one fragment of an oversized message
//! - RELIABLE: a sequence number followed by any other envelope, recursively

use crate::codec::{Codec, Field, FieldSpec, FieldType};
use crate::error::{ProtocolError, Result};
use bytes::{BufMut, Bytes, BytesMut};

pub const PROTOCOL_ID: u32 = 0x4F457403;

/// Peer id the server uses for itself in every datagram it sends.
pub const SERVER_PEER_ID: u16 = 0x0001;

/// Peer id a client uses until the server assigns one.
pub const PEER_ID_UNASSIGNED: u16 = 0x0000;

pub const HEADER_SIZE: usize = 7;

const HEADER_LAYOUT: &[FieldSpec] = &[
    ("protocol_id", FieldType::U32),
    ("peer_id", FieldType::U16),
    ("channel", FieldType::U8),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Control = 0x00,
    Original = 0x01,
    Split = 0x02,
    Reliable = 0x03,
}

impl TryFrom<u8> for PacketType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(PacketType::Control),
            0x01 => Ok(PacketType::Original),
            0x02 => Ok(PacketType::Split),
            0x03 => Ok(PacketType::Reliable),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlType {
    Ack = 0x00,
    SetPeerId = 0x01,
    Ping = 0x02,
    Disco = 0x03,
}

impl TryFrom<u8> for ControlType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(ControlType::Ack),
            0x01 => Ok(ControlType::SetPeerId),
            0x02 => Ok(ControlType::Ping),
            0x03 => Ok(ControlType::Disco),
            other => Err(ProtocolError::UnknownControlType(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportHeader {
    pub protocol_id: u32,
    pub peer_id: u16,
    pub channel: u8,
}

/// Prepends the transport header to an encoded packet body.
pub fn frame(codec: &Codec, peer_id: u16, channel: u8, body: &[u8]) -> Result<Bytes> {
    let header = codec.encode(&[
        Field::u32("protocol_id", PROTOCOL_ID),
        Field::u16("peer_id", peer_id),
        Field::u8("channel", channel),
    ])?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body.len());
    buf.put_slice(&header);
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// Strips and validates the transport header of an inbound datagram.
///
/// Only datagrams stamped with the server's own peer id are accepted; the
/// server never relays traffic from other peers to us.
pub fn unframe(codec: &Codec, datagram: Bytes) -> Result<(TransportHeader, Bytes)> {
    let mut data = datagram;
    let values = codec.decode(HEADER_LAYOUT, &mut data)?;

    let header = TransportHeader {
        protocol_id: field(&values, 0, "protocol_id", |v| v.as_u32())?,
        peer_id: field(&values, 1, "peer_id", |v| v.as_u16())?,
        channel: field(&values, 2, "channel", |v| v.as_u8())?,
    };

    if header.protocol_id != PROTOCOL_ID {
        return Err(ProtocolError::ProtocolMismatch(header.protocol_id));
    }
    if header.peer_id != SERVER_PEER_ID {
        return Err(ProtocolError::PeerMismatch(header.peer_id));
    }

    Ok((header, data))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Ack(u16),
    SetPeerId(u16),
    Ping,
    Disco,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Control(Control),
    Original(Bytes),
    Split {
        seq: u16,
        chunk_count: u16,
        chunk_index: u16,
        data: Bytes,
    },
    Reliable {
        seq: u16,
        inner: Box<Packet>,
    },
}

impl Packet {
    pub fn original(payload: impl Into<Bytes>) -> Self {
        Packet::Original(payload.into())
    }

    pub fn reliable(seq: u16, inner: Packet) -> Self {
        Packet::Reliable {
            seq,
            inner: Box::new(inner),
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Control(_) => PacketType::Control,
            Packet::Original(_) => PacketType::Original,
            Packet::Split { .. } => PacketType::Split,
            Packet::Reliable { .. } => PacketType::Reliable,
        }
    }

    /// Parses a packet body (everything after the transport header).
    pub fn parse(codec: &Codec, body: Bytes) -> Result<Packet> {
        let mut data = body;
        let values = codec.decode(&[("packet_type", FieldType::U8)], &mut data)?;
        let packet_type = PacketType::try_from(field(&values, 0, "packet_type", |v| v.as_u8())?)?;

        match packet_type {
            PacketType::Control => Self::parse_control(codec, data),
            PacketType::Original => Ok(Packet::Original(data)),
            PacketType::Split => {
                let values = codec.decode(
                    &[
                        ("seqnum", FieldType::U16),
                        ("chunk_count", FieldType::U16),
                        ("chunk_num", FieldType::U16),
                    ],
                    &mut data,
                )?;
                Ok(Packet::Split {
                    seq: field(&values, 0, "seqnum", |v| v.as_u16())?,
                    chunk_count: field(&values, 1, "chunk_count", |v| v.as_u16())?,
                    chunk_index: field(&values, 2, "chunk_num", |v| v.as_u16())?,
                    data,
                })
            }
            PacketType::Reliable => {
                let values = codec.decode(&[("seqnum", FieldType::U16)], &mut data)?;
                let seq = field(&values, 0, "seqnum", |v| v.as_u16())?;
                let inner = Self::parse(codec, data)?;
                Ok(Packet::reliable(seq, inner))
            }
        }
    }

    fn parse_control(codec: &Codec, mut data: Bytes) -> Result<Packet> {
        let values = codec.decode(&[("control_type", FieldType::U8)], &mut data)?;
        let control_type =
            ControlType::try_from(field(&values, 0, "control_type", |v| v.as_u8())?)?;

        let control = match control_type {
            ControlType::Ping => Control::Ping,
            ControlType::Disco => Control::Disco,
            ControlType::Ack | ControlType::SetPeerId => {
                let values = codec.decode(&[("value", FieldType::U16)], &mut data)?;
                let value = field(&values, 0, "value", |v| v.as_u16())?;
                if control_type == ControlType::Ack {
                    Control::Ack(value)
                } else {
                    Control::SetPeerId(value)
                }
            }
        };

        Ok(Packet::Control(control))
    }

    /// Encodes the packet body, without the transport header.
    pub fn encode(&self, codec: &Codec) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_into(codec, &mut buf)?;
        Ok(buf.freeze())
    }

    fn encode_into(&self, codec: &Codec, buf: &mut BytesMut) -> Result<()> {
        let tag = Field::u8("packet_type", self.packet_type() as u8);

        match self {
            Packet::Control(control) => {
                let fields = match *control {
                    Control::Ack(seq) => vec![
                        tag,
                        Field::u8("control_type", ControlType::Ack as u8),
                        Field::u16("seqnum", seq),
                    ],
                    Control::SetPeerId(peer_id) => vec![
                        tag,
                        Field::u8("control_type", ControlType::SetPeerId as u8),
                        Field::u16("peer_id", peer_id),
                    ],
                    Control::Ping => vec![tag, Field::u8("control_type", ControlType::Ping as u8)],
                    Control::Disco => {
                        vec![tag, Field::u8("control_type", ControlType::Disco as u8)]
                    }
                };
                buf.put_slice(&codec.encode(&fields)?);
            }
            Packet::Original(payload) => {
                buf.put_slice(&codec.encode(&[tag])?);
                buf.put_slice(payload);
            }
            Packet::Split {
                seq,
                chunk_count,
                chunk_index,
                data,
            } => {
                buf.put_slice(&codec.encode(&[
                    tag,
                    Field::u16("seqnum", *seq),
                    Field::u16("chunk_count", *chunk_count),
                    Field::u16("chunk_num", *chunk_index),
                ])?);
                buf.put_slice(data);
            }
            Packet::Reliable { seq, inner } => {
                buf.put_slice(&codec.encode(&[tag, Field::u16("seqnum", *seq)])?);
                inner.encode_into(codec, buf)?;
            }
        }

        Ok(())
    }
}

/// Pulls one typed value out of a decoded field list.
pub(crate) fn field<T>(
    values: &[crate::codec::Value],
    index: usize,
    name: &'static str,
    get: impl Fn(&crate::codec::Value) -> Option<T>,
) -> Result<T> {
    values
        .get(index)
        .and_then(get)
        .ok_or(ProtocolError::FieldMismatch(name))
}
