//! Typed application commands
//!
//! Payloads carried by ORIGINAL packets, in both directions. Only the
//! commands this client acts on are modelled; every other inbound id is
//! reported as [`ServerCommand::Ignored`] or [`ServerCommand::Unknown`].
//!
//! Fixed-point conventions:
//! - inbound MOVE_PLAYER: position and angles are i32 scaled by 1000
//! - outbound PLAYERPOS: position scaled by 1000, speed and angles by 100
//!
//! Text is UTF-16BE preceded by a u16 count of code units.

use crate::codec::{Codec, Field, FieldType};
use crate::commands::{toclient, toserver};
use crate::error::{ProtocolError, Result};
use crate::packet::field;
use bytes::{BufMut, Bytes, BytesMut};

pub const SER_FMT_VER_HIGHEST_READ: u8 = 0x1A;
pub const MIN_SUPPORTED_PROTOCOL: u16 = 0x25;
pub const MAX_SUPPORTED_PROTOCOL: u16 = 0x2C;
pub const USERNAME_WIDTH: usize = 20;

pub const POSITION_SCALE: f64 = 1000.0;
pub const MOVE_ANGLE_SCALE: f64 = 1000.0;
pub const SPEED_SCALE: f64 = 100.0;
pub const PLAYERPOS_ANGLE_SCALE: f64 = 100.0;

/// Inbound ids that are understood but carry nothing this client uses.
const IGNORED: &[u16] = &[
    toclient::HELLO,
    toclient::INVENTORY_FORMSPEC,
    toclient::INVENTORY,
    toclient::PRIVILEGES,
    toclient::MOVEMENT,
    toclient::BREATH,
    toclient::DETACHED_INVENTORY,
    toclient::TIME_OF_DAY,
    toclient::REMOVENODE,
    toclient::ADDNODE,
    toclient::PLAY_SOUND,
    toclient::STOP_SOUND,
    toclient::NODEDEF,
    toclient::ANNOUNCE_MEDIA,
    toclient::ITEMDEF,
];

#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Init {
        username: String,
    },
    Init2,
    ChatMessage(String),
    Respawn,
    /// Self-inflicted damage in half-hearts
    Damage(u8),
    PlayerPos {
        position: [f64; 3],
        speed: [f64; 3],
        pitch: f64,
        yaw: f64,
        keys: u32,
    },
}

impl ClientCommand {
    pub fn command_id(&self) -> u16 {
        match self {
            ClientCommand::Init { .. } => toserver::INIT,
            ClientCommand::Init2 => toserver::INIT2,
            ClientCommand::ChatMessage(_) => toserver::CHAT_MESSAGE,
            ClientCommand::Respawn => toserver::RESPAWN,
            ClientCommand::Damage(_) => toserver::DAMAGE,
            ClientCommand::PlayerPos { .. } => toserver::PLAYERPOS,
        }
    }

    pub fn encode(&self, codec: &Codec) -> Result<Bytes> {
        let mut fields = vec![Field::u16("command", self.command_id())];

        match self {
            ClientCommand::Init { username } => {
                fields.push(Field::u8("ser_fmt_ver", SER_FMT_VER_HIGHEST_READ));
                fields.push(Field::u16("min_proto", MIN_SUPPORTED_PROTOCOL));
                fields.push(Field::u16("max_proto", MAX_SUPPORTED_PROTOCOL));
                fields.push(Field::fixed("username", USERNAME_WIDTH, username.as_bytes()));
            }
            ClientCommand::Init2 | ClientCommand::Respawn => {}
            ClientCommand::ChatMessage(text) => {
                let wide = encode_wide(text);
                let units = u16::try_from(wide.len() / 2).map_err(|_| {
                    ProtocolError::FieldTooLong {
                        field: "message",
                        len: wide.len(),
                        width: u16::MAX as usize * 2,
                    }
                })?;
                fields.push(Field::u16("length", units));
                fields.push(Field::fixed("message", wide.len(), wide));
            }
            ClientCommand::Damage(amount) => fields.push(Field::u8("amount", *amount)),
            ClientCommand::PlayerPos {
                position,
                speed,
                pitch,
                yaw,
                keys,
            } => {
                fields.push(Field::i32("x", scale(position[0], POSITION_SCALE)));
                fields.push(Field::i32("y", scale(position[1], POSITION_SCALE)));
                fields.push(Field::i32("z", scale(position[2], POSITION_SCALE)));
                fields.push(Field::i32("speed_x", scale(speed[0], SPEED_SCALE)));
                fields.push(Field::i32("speed_y", scale(speed[1], SPEED_SCALE)));
                fields.push(Field::i32("speed_z", scale(speed[2], SPEED_SCALE)));
                fields.push(Field::i32("pitch", scale(*pitch, PLAYERPOS_ANGLE_SCALE)));
                fields.push(Field::i32("yaw", scale(*yaw, PLAYERPOS_ANGLE_SCALE)));
                fields.push(Field::u32("keys", *keys));
            }
        }

        codec.encode(&fields)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerCommand {
    MovePlayer {
        position: [f64; 3],
        pitch: f64,
        yaw: f64,
    },
    ChatMessage(String),
    Hp(u8),
    Deathscreen,
    AccessDenied {
        reason: String,
    },
    /// Recognized, but nothing to do with it
    Ignored(u16),
    Unknown(u16),
}

impl ServerCommand {
    pub fn decode(codec: &Codec, payload: Bytes) -> Result<ServerCommand> {
        let mut data = payload;
        let values = codec.decode(&[("command", FieldType::U16)], &mut data)?;
        let command = field(&values, 0, "command", |v| v.as_u16())?;

        let decoded = match command {
            toclient::MOVE_PLAYER => {
                let values = codec.decode(
                    &[
                        ("x", FieldType::I32),
                        ("y", FieldType::I32),
                        ("z", FieldType::I32),
                        ("pitch", FieldType::I32),
                        ("yaw", FieldType::I32),
                    ],
                    &mut data,
                )?;
                let get = |index, name| field(&values, index, name, |v| v.as_i32());
                ServerCommand::MovePlayer {
                    position: [
                        get(0, "x")? as f64 / POSITION_SCALE,
                        get(1, "y")? as f64 / POSITION_SCALE,
                        get(2, "z")? as f64 / POSITION_SCALE,
                    ],
                    pitch: get(3, "pitch")? as f64 / MOVE_ANGLE_SCALE,
                    yaw: get(4, "yaw")? as f64 / MOVE_ANGLE_SCALE,
                }
            }
            toclient::CHAT_MESSAGE => {
                ServerCommand::ChatMessage(decode_wide(codec, "message", &mut data)?)
            }
            toclient::HP => {
                let values = codec.decode(&[("hp", FieldType::U8)], &mut data)?;
                ServerCommand::Hp(field(&values, 0, "hp", |v| v.as_u8())?)
            }
            toclient::DEATHSCREEN => ServerCommand::Deathscreen,
            toclient::ACCESS_DENIED => ServerCommand::AccessDenied {
                reason: decode_wide(codec, "reason", &mut data)?,
            },
            id if IGNORED.contains(&id) => ServerCommand::Ignored(id),
            id => ServerCommand::Unknown(id),
        };

        Ok(decoded)
    }
}

/// Reads the leading command id without decoding the rest.
pub fn peek_command_id(payload: &[u8]) -> Option<u16> {
    match payload {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

fn scale(value: f64, factor: f64) -> i32 {
    (value * factor).round() as i32
}

fn encode_wide(text: &str) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        buf.put_u16(unit);
    }
    buf.to_vec()
}

fn decode_wide(codec: &Codec, name: &'static str, data: &mut Bytes) -> Result<String> {
    let values = codec.decode(&[("length", FieldType::U16)], data)?;
    let units = field(&values, 0, "length", |v| v.as_u16())? as usize;

    let values = codec.decode(&[(name, FieldType::Fixed(units * 2))], data)?;
    let raw = field(&values, 0, name, |v| v.as_bytes().map(<[u8]>::to_vec))?;

    let wide: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&wide).map_err(|_| ProtocolError::InvalidText(name))
}
