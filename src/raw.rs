//! Schema-less codec over raw tagged records.
//!
//! Useful for analyzing protobuf messages with an unknown schema: records
//! carry the field number, wire type, and uninterpreted payload, nothing
//! else. Varints stay in their unsigned two's-complement form regardless of
//! any ZigZag encoding the producer applied, and fixed payloads stay raw
//! little-endian blocks.

#![allow(clippy::as_conversions)]

use alloc::vec::Vec;

use bytes::{BufMut, Bytes};

use crate::cursor::Cursor;
use crate::error::CodecError;
use crate::varint;
use crate::wire::{self, WireType, MAXIMUM_TAG_VAL, MINIMUM_TAG_VAL};

/// The uninterpreted payload of a raw record. The variant fixes the wire
/// type, so a record can never claim a wire type its payload does not have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// An unsigned varint, as read off the wire.
    Varint(u64),
    /// A 4-byte little-endian block.
    Fixed32([u8; 4]),
    /// An 8-byte little-endian block.
    Fixed64([u8; 8]),
    /// A length-delimited payload, without its length prefix.
    Bytes(Bytes),
}

impl RawValue {
    pub fn wire_type(&self) -> WireType {
        match self {
            RawValue::Varint(_) => WireType::Varint,
            RawValue::Fixed32(_) => WireType::I32,
            RawValue::Fixed64(_) => WireType::I64,
            RawValue::Bytes(_) => WireType::Len,
        }
    }
}

/// One `(field number, wire type, payload)` record of a protobuf message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// The field number the payload belongs to.
    pub id: u32,
    pub data: RawValue,
}

impl RawRecord {
    pub fn new(id: u32, data: RawValue) -> Self {
        RawRecord { id, data }
    }

    pub fn wire_type(&self) -> WireType {
        self.data.wire_type()
    }
}

/// Encodes a sequence of raw records back to wire format.
///
/// Fails only if a record's field number is out of range.
pub fn encode_raw(records: &[RawRecord]) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    for record in records {
        if record.id < MINIMUM_TAG_VAL || record.id > MAXIMUM_TAG_VAL {
            return Err(CodecError::InvalidTag {
                tag: u64::from(record.id),
            });
        }
        wire::encode_key(record.wire_type(), record.id, &mut buf);
        match &record.data {
            RawValue::Varint(value) => {
                varint::encode_uvarint(*value, &mut buf);
            }
            RawValue::Fixed32(block) => buf.put_slice(block),
            RawValue::Fixed64(block) => buf.put_slice(block),
            RawValue::Bytes(data) => {
                varint::encode_uvarint(data.len() as u64, &mut buf);
                buf.put_slice(data);
            }
        }
    }
    Ok(buf)
}

/// Decodes wire data into the full sequence of raw records it contains.
pub fn decode_raw(data: &[u8]) -> Result<Vec<RawRecord>, CodecError> {
    RawDecoder::new(data).collect()
}

/// A restartable cursor yielding one [`RawRecord`] at a time.
///
/// Stops cleanly at end of input. Truncation mid-record fails with
/// [`CodecError::EndOfMessage`] whose `partial` flag reflects whether bytes
/// were consumed past the last complete record boundary. After an error the
/// iterator is fused.
#[derive(Debug)]
pub struct RawDecoder<'a> {
    cur: Cursor<'a>,
    boundary: usize,
    failed: bool,
}

impl<'a> RawDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        RawDecoder {
            cur: Cursor::new(data),
            boundary: 0,
            failed: false,
        }
    }

    /// Reads the next record, or `Ok(None)` at a clean end of input.
    pub fn next_record(&mut self) -> Result<Option<RawRecord>, CodecError> {
        if self.cur.is_empty() {
            return Ok(None);
        }
        match read_record(&mut self.cur) {
            Ok(record) => {
                self.boundary = self.cur.pos();
                Ok(Some(record))
            }
            Err(CodecError::EndOfMessage { .. }) => Err(CodecError::EndOfMessage {
                partial: self.cur.pos() > self.boundary,
            }),
            Err(err) => Err(err),
        }
    }
}

fn read_record(cur: &mut Cursor<'_>) -> Result<RawRecord, CodecError> {
    let key = wire::decode_key(cur)?;
    let data = match key.wire_type {
        WireType::Varint => RawValue::Varint(varint::decode_uvarint(cur)?),
        WireType::I64 => RawValue::Fixed64(cur.read_array()?),
        WireType::I32 => RawValue::Fixed32(cur.read_array()?),
        WireType::Len => {
            let payload = wire::read_len_delimited(cur)?;
            RawValue::Bytes(Bytes::copy_from_slice(payload))
        }
    };
    Ok(RawRecord::new(key.tag, data))
}

impl Iterator for RawDecoder<'_> {
    type Item = Result<RawRecord, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}
