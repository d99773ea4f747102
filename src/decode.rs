//! Schema-driven decoder: streams records off a byte slice, aggregates them
//! into per-field accumulators, and materializes the structured payload.

#![allow(clippy::as_conversions)]

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use bytes::Bytes;

use crate::cursor::Cursor;
use crate::error::CodecError;
use crate::schema::{Cardinality, FieldDescriptor, FieldSet, FieldType};
use crate::value::{Payload, Value};
use crate::varint::{self, VintWidth};
use crate::wire::{self, WireType};

/// Per-field accumulator, one per payload slot.
enum Slot {
    Empty,
    /// Singular non-nested value; overwritten on duplicates (last wins).
    Single(Value),
    /// Raw sub-message bytes of a singular nested field. Duplicates are
    /// concatenated before the recursive decode, the protobuf merge rule.
    NestedBytes(Vec<u8>),
    /// Elements of a repeated or packed field, in arrival order.
    Repeated(Vec<Value>),
}

impl Slot {
    fn is_set(&self) -> bool {
        !matches!(self, Slot::Empty)
    }

    fn set(&mut self, value: Value) {
        *self = Slot::Single(value);
    }

    fn push(&mut self, value: Value) {
        match self {
            Slot::Repeated(values) => values.push(value),
            _ => *self = Slot::Repeated(alloc::vec![value]),
        }
    }

    fn append_bytes(&mut self, chunk: &[u8]) -> bool {
        match self {
            Slot::NestedBytes(acc) => {
                acc.extend_from_slice(chunk);
                true
            }
            _ => {
                *self = Slot::NestedBytes(chunk.to_vec());
                false
            }
        }
    }
}

pub(crate) fn decode_message(
    fields: &FieldSet,
    data: &[u8],
    width: VintWidth,
    sparse: bool,
) -> Result<Payload, CodecError> {
    let mut slots: Vec<Slot> = core::iter::repeat_with(|| Slot::Empty)
        .take(fields.slot_count())
        .collect();

    let mut cur = Cursor::new(data);
    let mut boundary = 0;
    while !cur.is_empty() {
        match decode_record(fields, &mut cur, width, sparse, &mut slots) {
            Ok(()) => boundary = cur.pos(),
            Err(CodecError::EndOfMessage { .. }) => {
                return Err(CodecError::EndOfMessage {
                    partial: cur.pos() > boundary,
                });
            }
            Err(err) => return Err(err),
        }
    }

    materialize(fields, slots, width, sparse)
}

fn decode_record(
    fields: &FieldSet,
    cur: &mut Cursor<'_>,
    width: VintWidth,
    sparse: bool,
    slots: &mut [Slot],
) -> Result<(), CodecError> {
    let key = wire::decode_key(cur)?;
    let (field, slot) = fields
        .lookup(key.tag)
        .ok_or(CodecError::UnknownField { tag: key.tag })?;
    let slot = &mut slots[slot as usize];

    // Placeholder fields are skipped by wire type; the value is discarded.
    let Some(expected) = field.ty.wire_type() else {
        return skip_value(key.wire_type, cur);
    };

    // A length-delimited record on a packed field is a packed run, as it is
    // on a repeated scalar whose element type is not itself length-delimited.
    let is_run = key.wire_type == WireType::Len
        && (field.cardinality == Cardinality::Packed
            || (field.cardinality == Cardinality::Repeated && expected != WireType::Len));

    if !is_run && key.wire_type != expected {
        return Err(CodecError::WireTypeMismatch {
            tag: key.tag,
            expected,
            actual: key.wire_type,
        });
    }

    if is_run {
        let run = wire::read_len_delimited(cur)?;
        if field.cardinality == Cardinality::Packed && slot.is_set() {
            warn_split_packed(key.tag);
        }
        let mut run_cur = Cursor::new(run);
        while !run_cur.is_empty() {
            // Truncation inside a run is always mid-record.
            let value = decode_single(&field.ty, &mut run_cur, width, sparse).map_err(|err| {
                match err {
                    CodecError::EndOfMessage { .. } => CodecError::EndOfMessage { partial: true },
                    other => other,
                }
            })?;
            slot.push(value);
        }
        return Ok(());
    }

    if field.cardinality.is_repeated() {
        let value = decode_single(&field.ty, cur, width, sparse)?;
        slot.push(value);
        return Ok(());
    }

    match &field.ty {
        FieldType::Message(_) => {
            let chunk = wire::read_len_delimited(cur)?;
            if slot.append_bytes(chunk) {
                warn_repeated_singular(key.tag);
            }
        }
        _ => {
            let value = decode_single(&field.ty, cur, width, sparse)?;
            if slot.is_set() {
                warn_repeated_singular(key.tag);
            }
            slot.set(value);
        }
    }
    Ok(())
}

/// Decodes one value of the given semantic type off the cursor.
fn decode_single(
    ty: &FieldType,
    cur: &mut Cursor<'_>,
    width: VintWidth,
    sparse: bool,
) -> Result<Value, CodecError> {
    match ty {
        FieldType::Skip => Ok(Value::None),
        FieldType::Bool => Ok(Value::Bool(varint::decode_uvarint(cur)? != 0)),
        FieldType::Uint => Ok(Value::Uint(varint::decode_uvarint(cur)?)),
        FieldType::Int => Ok(Value::Int(width.wire_to_signed(varint::decode_uvarint(cur)?))),
        FieldType::Sint => Ok(Value::Int(varint::zigzag_decode(varint::decode_uvarint(cur)?))),
        FieldType::Fixed32 => Ok(Value::Uint(u64::from(u32::from_le_bytes(cur.read_array()?)))),
        FieldType::Sfixed32 => Ok(Value::Int(i64::from(i32::from_le_bytes(cur.read_array()?)))),
        FieldType::Fixed64 => Ok(Value::Uint(u64::from_le_bytes(cur.read_array()?))),
        FieldType::Sfixed64 => Ok(Value::Int(i64::from_le_bytes(cur.read_array()?))),
        FieldType::Float => Ok(Value::Float(f32::from_le_bytes(cur.read_array()?))),
        FieldType::Double => Ok(Value::Double(f64::from_le_bytes(cur.read_array()?))),
        FieldType::Bytes => {
            let chunk = wire::read_len_delimited(cur)?;
            Ok(Value::Bytes(Bytes::copy_from_slice(chunk)))
        }
        FieldType::Str => {
            let chunk = wire::read_len_delimited(cur)?;
            let text = core::str::from_utf8(chunk).map_err(|_| CodecError::BadString)?;
            Ok(Value::Str(String::from(text)))
        }
        FieldType::Message(nested) => {
            let chunk = wire::read_len_delimited(cur)?;
            Ok(Value::Message(decode_message(nested, chunk, width, sparse)?))
        }
    }
}

fn skip_value(wire_type: WireType, cur: &mut Cursor<'_>) -> Result<(), CodecError> {
    match wire_type {
        WireType::Varint => {
            varint::decode_uvarint(cur)?;
        }
        WireType::I32 => {
            cur.read_exact(4)?;
        }
        WireType::I64 => {
            cur.read_exact(8)?;
        }
        WireType::Len => {
            wire::read_len_delimited(cur)?;
        }
    }
    Ok(())
}

fn materialize(
    fields: &FieldSet,
    slots: Vec<Slot>,
    width: VintWidth,
    sparse: bool,
) -> Result<Payload, CodecError> {
    let mut slots = slots.into_iter();

    if fields.named() {
        let mut entries = BTreeMap::new();
        for field in fields.iter() {
            for k in 0..field.count {
                let Some(slot) = slots.next() else { break };
                let value = finish_slot(field, field.tag + k, slot, width, sparse)?;
                let Some(name) = field.name.as_deref() else {
                    continue;
                };
                if value.is_none() && sparse {
                    continue;
                }
                entries.insert(String::from(name), value);
            }
        }
        Ok(Payload::Map(entries))
    } else {
        let mut values = Vec::with_capacity(fields.slot_count());
        for field in fields.iter() {
            for k in 0..field.count {
                let Some(slot) = slots.next() else { break };
                values.push(finish_slot(field, field.tag + k, slot, width, sparse)?);
            }
        }
        Ok(Payload::Seq(values))
    }
}

fn finish_slot(
    field: &FieldDescriptor,
    tag: u32,
    slot: Slot,
    width: VintWidth,
    sparse: bool,
) -> Result<Value, CodecError> {
    match slot {
        Slot::Empty => {
            if field.cardinality == Cardinality::Required {
                Err(CodecError::RequiredFieldMissing {
                    tag,
                    name: field.name.clone(),
                })
            } else if field.cardinality.is_repeated() {
                Ok(Value::List(Vec::new()))
            } else {
                Ok(Value::None)
            }
        }
        Slot::Single(value) => Ok(value),
        Slot::NestedBytes(data) => match &field.ty {
            FieldType::Message(nested) => {
                Ok(Value::Message(decode_message(nested, &data, width, sparse)?))
            }
            _ => Ok(Value::None),
        },
        Slot::Repeated(values) => Ok(Value::List(values)),
    }
}

fn warn_split_packed(_tag: u32) {
    #[cfg(feature = "log")]
    log::warn!("multiple runs found in packed field {_tag}");
}

fn warn_repeated_singular(_tag: u32) {
    #[cfg(feature = "log")]
    log::warn!("multiple records found for singular field {_tag}");
}

#[cfg(test)]
mod tests {
    use crate::error::CodecError;
    use crate::schema::Schema;
    use crate::value::{Payload, Value};

    #[test]
    fn test_unknown_field_rejected() {
        let schema = Schema::parse("U").unwrap();
        // Field 2, varint 1.
        let err = schema.decode(&[0x10, 0x01]).unwrap_err();
        assert_eq!(err, CodecError::UnknownField { tag: 2 });
    }

    #[test]
    fn test_wire_type_mismatch() {
        let schema = Schema::parse("U").unwrap();
        // Field 1 as varint where a string is declared.
        let err = schema.decode(&[0x08, 0x01]).unwrap_err();
        assert!(matches!(err, CodecError::WireTypeMismatch { tag: 1, .. }));
    }

    #[test]
    fn test_last_value_wins_for_singular() {
        let schema = Schema::parse("T").unwrap();
        let decoded = schema.decode(&[0x08, 0x01, 0x08, 0x02]).unwrap();
        assert_eq!(decoded, Payload::seq([Value::Uint(2)]));
    }

    #[test]
    fn test_singular_nested_records_merge() {
        // Two records for one singular nested field: their bodies concatenate
        // before the recursive decode, so the later scalar wins.
        let schema = Schema::parse("[TU]").unwrap();
        let data = [
            0x0a, 0x02, 0x08, 0x01, // { a: 1 }
            0x0a, 0x04, 0x08, 0x02, 0x12, 0x00, // { a: 2, b: "" }
        ];
        let decoded = schema.decode(&data).unwrap();
        let nested = decoded.at(0).and_then(Value::as_message).unwrap();
        assert_eq!(nested.at(0), Some(&Value::Uint(2)));
        assert_eq!(nested.at(1), Some(&Value::Str(alloc::string::String::new())));
    }

    #[test]
    fn test_empty_input_decodes_to_defaults() {
        let schema = Schema::parse("Tx+[U]").unwrap();
        let decoded = schema.decode(&[]).unwrap();
        assert_eq!(
            decoded,
            Payload::Seq(alloc::vec![
                Value::None,
                Value::None,
                Value::List(alloc::vec::Vec::new()),
            ])
        );
    }

    #[test]
    fn test_empty_input_required_fails() {
        let schema = Schema::parse("*T").unwrap();
        let err = schema.decode(&[]).unwrap_err();
        assert!(matches!(err, CodecError::RequiredFieldMissing { tag: 1, .. }));
    }

    #[test]
    fn test_placeholder_records_are_skipped() {
        // x at tag 1 receives a varint record; it is discarded.
        let schema = Schema::parse("xT").unwrap();
        let decoded = schema.decode(&[0x08, 0x63, 0x10, 0x01]).unwrap();
        assert_eq!(decoded, Payload::seq([Value::None, Value::Uint(1)]));
    }

    #[test]
    fn test_bad_utf8() {
        let schema = Schema::parse("U").unwrap();
        let err = schema.decode(&[0x0a, 0x02, 0xff, 0xfe]).unwrap_err();
        assert_eq!(err, CodecError::BadString);
    }

    #[test]
    fn test_truncated_payload_is_partial() {
        let schema = Schema::parse("U").unwrap();
        let err = schema.decode(&[0x0a, 0x07, 0x74, 0x65]).unwrap_err();
        assert_eq!(err, CodecError::EndOfMessage { partial: true });
        assert!(err.is_partial());
    }
}
