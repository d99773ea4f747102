//! Wire format for Google's Protocol Buffers, aka [protobuf](https://protobuf.dev).

// This module uses `as` casts which have been reviewed for correctness.
#![allow(clippy::as_conversions)]

use bytes::BufMut;

use crate::cursor::Cursor;
use crate::error::CodecError;
use crate::varint;

/// Minimum value of a protobuf field number.
pub const MINIMUM_TAG_VAL: u32 = 1;
/// Maximum value of a protobuf field number.
pub const MAXIMUM_TAG_VAL: u32 = (1 << 29) - 1;

/// Denotes the shape of a field's payload in an encoded protobuf message.
///
/// Messages are a series of records, each introduced by a key holding a field
/// number and one of these wire types. The deprecated group wire types (3 and
/// 4) are never produced and are rejected on ingest.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WireType {
    /// Variable length integer: varint, ZigZag and two's-complement signed
    /// integers, booleans.
    Varint = 0,
    /// 64-bit little-endian block: `fixed64`, `sfixed64`, `double`.
    I64 = 1,
    /// Length-delimited: `bytes`, `string`, nested messages, packed repeated
    /// fields.
    Len = 2,
    /// 32-bit little-endian block: `fixed32`, `sfixed32`, `float`.
    I32 = 5,
}

impl WireType {
    /// Decodes a raw wire type value, rejecting groups and unknown values.
    pub fn try_from_val(value: u8) -> Result<Self, CodecError> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            5 => Ok(WireType::I32),
            3 | 4 => Err(CodecError::GroupEncoding),
            _ => Err(CodecError::InvalidWireType { value }),
        }
    }

    /// The raw value for this [`WireType`].
    pub const fn into_val(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for WireType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, CodecError> {
        WireType::try_from_val(value)
    }
}

/// A decoded field key: wire type plus field number.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldKey {
    pub tag: u32,
    pub wire_type: WireType,
}

/// Encodes `(tag << 3) | wire_type` as an unsigned varint.
pub fn encode_key<B: BufMut>(wire_type: WireType, tag: u32, buf: &mut B) {
    let key = (u64::from(tag) << 3) | u64::from(wire_type.into_val());
    varint::encode_uvarint(key, buf);
}

/// Decodes a field key, validating the wire type and field number.
pub(crate) fn decode_key(cur: &mut Cursor<'_>) -> Result<FieldKey, CodecError> {
    let raw = varint::decode_uvarint(cur)?;
    let wire_type = WireType::try_from_val((raw & 0b111) as u8)?;
    let tag = raw >> 3;
    if tag < u64::from(MINIMUM_TAG_VAL) || tag > u64::from(MAXIMUM_TAG_VAL) {
        return Err(CodecError::InvalidTag { tag });
    }
    Ok(FieldKey {
        tag: tag as u32,
        wire_type,
    })
}

/// Decodes the length prefix of a length-delimited field.
pub(crate) fn decode_len(cur: &mut Cursor<'_>) -> Result<usize, CodecError> {
    let len = varint::decode_uvarint(cur)?;
    usize::try_from(len).map_err(|_| CodecError::LengthOverflow { len })
}

/// Reads one length-delimited payload. A payload shorter than its prefix is
/// always a partial record, the prefix itself having been consumed.
pub(crate) fn read_len_delimited<'a>(cur: &mut Cursor<'a>) -> Result<&'a [u8], CodecError> {
    let len = decode_len(cur)?;
    cur.read_exact(len)
        .map_err(|_| CodecError::EndOfMessage { partial: true })
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use proptest::prelude::*;

    use super::*;

    fn decode_key_slice(data: &[u8]) -> Result<FieldKey, CodecError> {
        decode_key(&mut Cursor::new(data))
    }

    #[test]
    fn test_key_vectors() {
        let mut buf = Vec::new();
        encode_key(WireType::Len, 1, &mut buf);
        assert_eq!(buf, [0x0a]);

        let mut buf = Vec::new();
        encode_key(WireType::Varint, 16, &mut buf);
        assert_eq!(buf, [0x80, 0x01]);

        assert_eq!(
            decode_key_slice(&[0x0a]).unwrap(),
            FieldKey {
                tag: 1,
                wire_type: WireType::Len
            }
        );
    }

    #[test]
    fn test_key_rejects_groups() {
        // Wire types 3 and 4 on field 1.
        assert_eq!(decode_key_slice(&[0x0b]), Err(CodecError::GroupEncoding));
        assert_eq!(decode_key_slice(&[0x0c]), Err(CodecError::GroupEncoding));
    }

    #[test]
    fn test_key_rejects_invalid_wire_type() {
        assert_eq!(
            decode_key_slice(&[0x0e]),
            Err(CodecError::InvalidWireType { value: 6 })
        );
        assert_eq!(
            decode_key_slice(&[0x0f]),
            Err(CodecError::InvalidWireType { value: 7 })
        );
    }

    #[test]
    fn test_key_rejects_tag_zero() {
        // Key 0b0000_0000: wire type 0, tag 0.
        assert_eq!(decode_key_slice(&[0x00]), Err(CodecError::InvalidTag { tag: 0 }));
    }

    #[test]
    fn test_key_rejects_oversized_tag() {
        // (2^29) << 3 | 0 as a varint.
        let mut buf = Vec::new();
        varint::encode_uvarint(1u64 << 32, &mut buf);
        assert_eq!(
            decode_key_slice(&buf),
            Err(CodecError::InvalidTag { tag: 1 << 29 })
        );
    }

    #[test]
    fn test_decode_len_vectors() {
        assert_eq!(decode_len(&mut Cursor::new(&[0x00])).unwrap(), 0);
        assert_eq!(decode_len(&mut Cursor::new(&[0x7f])).unwrap(), 127);
        assert_eq!(decode_len(&mut Cursor::new(&[0x80, 0x01])).unwrap(), 128);
        assert_eq!(decode_len(&mut Cursor::new(&[0xac, 0x02])).unwrap(), 300);
    }

    #[test]
    fn test_len_delimited_truncation() {
        // Length 4, only two payload bytes.
        let mut cur = Cursor::new(&[0x04, 0x68, 0x69]);
        assert_eq!(
            read_len_delimited(&mut cur),
            Err(CodecError::EndOfMessage { partial: true })
        );

        // Length prefix present, no payload at all: still a partial record.
        let mut cur = Cursor::new(&[0x04]);
        assert_eq!(
            read_len_delimited(&mut cur),
            Err(CodecError::EndOfMessage { partial: true })
        );
    }

    proptest! {
        #[test]
        fn proptest_key_roundtrips(
            tag in MINIMUM_TAG_VAL..=MAXIMUM_TAG_VAL,
            wire_type in prop_oneof![
                Just(WireType::Varint),
                Just(WireType::I64),
                Just(WireType::Len),
                Just(WireType::I32),
            ],
        ) {
            let mut buf = Vec::new();
            encode_key(wire_type, tag, &mut buf);
            let key = decode_key_slice(&buf).unwrap();
            prop_assert_eq!(key.tag, tag);
            prop_assert_eq!(key.wire_type, wire_type);
        }
    }
}
