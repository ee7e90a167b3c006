//! Fixed-width big-endian field codec
//!
//! Every message on the wire is a flat sequence of fixed-width fields. Callers
//! describe a message as an ordered list of typed fields and the codec turns
//! it into bytes, or consumes exactly the declared widths from a buffer.
//!
//! There are no variable-length primitives: a length field is just another
//! `U16` that the caller reads and then acts upon.
//!
//! An optional [`TraceHook`] observes every field as it is written or read.
//! It is purely an instrumentation side channel and never changes results.

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    /// Fixed-length byte or string field, zero padded on encode
    Fixed(usize),
}

impl FieldType {
    pub fn width(&self) -> usize {
        match self {
            FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 => 4,
            FieldType::Fixed(width) => *width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    I8(i8),
    I16(i16),
    I32(i32),
    Fixed(Vec<u8>),
}

impl Value {
    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Value::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Fixed(v) => Some(v),
            _ => None,
        }
    }
}

/// One named, typed field of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub value: Value,
}

impl Field {
    pub fn u8(name: &'static str, value: u8) -> Self {
        Self {
            name,
            ty: FieldType::U8,
            value: Value::U8(value),
        }
    }

    pub fn u16(name: &'static str, value: u16) -> Self {
        Self {
            name,
            ty: FieldType::U16,
            value: Value::U16(value),
        }
    }

    pub fn u32(name: &'static str, value: u32) -> Self {
        Self {
            name,
            ty: FieldType::U32,
            value: Value::U32(value),
        }
    }

    pub fn i32(name: &'static str, value: i32) -> Self {
        Self {
            name,
            ty: FieldType::I32,
            value: Value::I32(value),
        }
    }

    pub fn fixed(name: &'static str, width: usize, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            ty: FieldType::Fixed(width),
            value: Value::Fixed(value.into()),
        }
    }
}

/// Layout entry used when decoding: field name and declared type.
pub type FieldSpec = (&'static str, FieldType);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

/// A single field observed by a [`TraceHook`].
#[derive(Debug, Serialize)]
pub struct FieldTrace<'a> {
    pub direction: Direction,
    pub name: &'static str,
    pub raw: &'a [u8],
    pub value: &'a Value,
}

pub trait TraceHook: Send + Sync {
    fn on_field(&self, trace: &FieldTrace<'_>);
}

#[derive(Clone, Default)]
pub struct Codec {
    hook: Option<Arc<dyn TraceHook>>,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("traced", &self.hook.is_some())
            .finish()
    }
}

impl Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: Arc<dyn TraceHook>) -> Self {
        Self { hook: Some(hook) }
    }

    /// Encodes the fields in order into a single buffer.
    pub fn encode(&self, fields: &[Field]) -> Result<Bytes> {
        let width: usize = fields.iter().map(|f| f.ty.width()).sum();
        let mut buf = BytesMut::with_capacity(width);

        for field in fields {
            let start = buf.len();
            match (field.ty, &field.value) {
                (FieldType::U8, Value::U8(v)) => buf.put_u8(*v),
                (FieldType::U16, Value::U16(v)) => buf.put_u16(*v),
                (FieldType::U32, Value::U32(v)) => buf.put_u32(*v),
                (FieldType::I8, Value::I8(v)) => buf.put_i8(*v),
                (FieldType::I16, Value::I16(v)) => buf.put_i16(*v),
                (FieldType::I32, Value::I32(v)) => buf.put_i32(*v),
                (FieldType::Fixed(width), Value::Fixed(v)) => {
                    if v.len() > width {
                        return Err(ProtocolError::FieldTooLong {
                            field: field.name,
                            len: v.len(),
                            width,
                        });
                    }
                    buf.put_slice(v);
                    buf.put_bytes(0, width - v.len());
                }
                _ => return Err(ProtocolError::FieldMismatch(field.name)),
            }
            self.trace(Direction::Sent, field.name, &buf[start..], &field.value);
        }

        Ok(buf.freeze())
    }

    /// Consumes the declared fields from the front of `data`, leaving the
    /// remainder in place for the caller.
    pub fn decode(&self, layout: &[FieldSpec], data: &mut Bytes) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(layout.len());

        for &(name, ty) in layout {
            let needed = ty.width();
            if data.remaining() < needed {
                return Err(ProtocolError::Truncated {
                    field: name,
                    needed,
                    available: data.remaining(),
                });
            }

            let raw = data.split_to(needed);
            let mut cursor = &raw[..];
            let value = match ty {
                FieldType::U8 => Value::U8(cursor.get_u8()),
                FieldType::U16 => Value::U16(cursor.get_u16()),
                FieldType::U32 => Value::U32(cursor.get_u32()),
                FieldType::I8 => Value::I8(cursor.get_i8()),
                FieldType::I16 => Value::I16(cursor.get_i16()),
                FieldType::I32 => Value::I32(cursor.get_i32()),
                FieldType::Fixed(_) => Value::Fixed(raw.to_vec()),
            };
            self.trace(Direction::Received, name, &raw, &value);
            values.push(value);
        }

        Ok(values)
    }

    fn trace(&self, direction: Direction, name: &'static str, raw: &[u8], value: &Value) {
        if let Some(hook) = &self.hook {
            hook.on_field(&FieldTrace {
                direction,
                name,
                raw,
                value,
            });
        }
    }
}
