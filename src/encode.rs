//! Schema-driven encoder: walks the compiled field set in declaration order
//! and serializes a payload to wire format.

#![allow(clippy::as_conversions)]

use alloc::vec::Vec;

use bytes::BufMut;

use crate::error::CodecError;
use crate::schema::{Cardinality, FieldDescriptor, FieldSet, FieldType};
use crate::value::{Payload, Value};
use crate::varint::{self, VintWidth};
use crate::wire::{self, WireType};

pub(crate) fn encode_message(
    fields: &FieldSet,
    payload: &Payload,
    width: VintWidth,
) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_fields(fields, payload, width, &mut buf)?;
    Ok(buf)
}

fn encode_fields(
    fields: &FieldSet,
    payload: &Payload,
    width: VintWidth,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    match payload {
        Payload::Seq(values) => {
            if fields.named() {
                return Err(CodecError::PayloadShape {
                    expected: "mapping",
                });
            }
            if values.len() != fields.slot_count() {
                return Err(CodecError::PayloadLength {
                    expected: fields.slot_count(),
                    actual: values.len(),
                });
            }
            let mut slot = 0;
            for field in fields.iter() {
                for k in 0..field.count {
                    let value = &values[slot];
                    slot += 1;
                    encode_field(field, field.tag + k, value, width, buf)?;
                }
            }
        }
        Payload::Map(entries) => {
            if !fields.named() {
                return Err(CodecError::PayloadShape {
                    expected: "sequence",
                });
            }
            for field in fields.iter() {
                if matches!(field.ty, FieldType::Skip) {
                    continue;
                }
                let name = field.name.as_deref().unwrap_or_default();
                let value = entries.get(name).unwrap_or(&Value::None);
                encode_field(field, field.tag, value, width, buf)?;
            }
        }
    }
    Ok(())
}

fn encode_field(
    field: &FieldDescriptor,
    tag: u32,
    value: &Value,
    width: VintWidth,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    // Placeholder slots carry no value and emit nothing.
    if matches!(field.ty, FieldType::Skip) {
        if !value.is_none() {
            return Err(mismatch(tag, "none"));
        }
        return Ok(());
    }
    let Some(wire_type) = field.ty.wire_type() else {
        return Ok(());
    };

    if value.is_none() {
        if field.cardinality == Cardinality::Required {
            return Err(CodecError::RequiredFieldMissing {
                tag,
                name: field.name.clone(),
            });
        }
        return Ok(());
    }

    match field.cardinality {
        Cardinality::Repeated => {
            let elements = value.as_list().ok_or_else(|| mismatch(tag, "list"))?;
            for element in elements {
                wire::encode_key(wire_type, tag, buf);
                encode_single(&field.ty, tag, element, width, buf)?;
            }
        }
        Cardinality::Packed => {
            let elements = value.as_list().ok_or_else(|| mismatch(tag, "list"))?;
            let mut body = Vec::new();
            for element in elements {
                encode_single(&field.ty, tag, element, width, &mut body)?;
            }
            wire::encode_key(WireType::Len, tag, buf);
            varint::encode_uvarint(body.len() as u64, buf);
            buf.put_slice(&body);
        }
        Cardinality::Optional | Cardinality::Required => {
            wire::encode_key(wire_type, tag, buf);
            encode_single(&field.ty, tag, value, width, buf)?;
        }
    }
    Ok(())
}

/// Encodes one value without its field key. Length-delimited types include
/// their length prefix, so packed bodies re-split cleanly.
fn encode_single(
    ty: &FieldType,
    tag: u32,
    value: &Value,
    width: VintWidth,
    buf: &mut Vec<u8>,
) -> Result<(), CodecError> {
    match ty {
        FieldType::Skip => {}
        FieldType::Bool => match value {
            Value::Bool(value) => buf.put_u8(*value as u8),
            _ => return Err(mismatch(tag, "bool")),
        },
        FieldType::Uint => {
            let raw = match value {
                Value::Uint(value) => *value,
                Value::Int(value) if *value >= 0 => *value as u64,
                Value::Int(_) => return Err(CodecError::ValueOutOfRange { tag }),
                _ => return Err(mismatch(tag, "uint")),
            };
            varint::encode_uvarint(raw, buf);
        }
        FieldType::Int => {
            // Out-of-range values wrap modulo 2^width.
            let value = match value {
                Value::Int(value) => *value,
                Value::Uint(value) => *value as i64,
                _ => return Err(mismatch(tag, "int")),
            };
            varint::encode_uvarint(width.signed_to_wire(value), buf);
        }
        FieldType::Sint => {
            let value = signed_value(tag, value, i64::MIN, i64::MAX)?;
            varint::encode_uvarint(varint::zigzag_encode(value), buf);
        }
        FieldType::Sfixed32 => {
            let value = signed_value(tag, value, i64::from(i32::MIN), i64::from(i32::MAX))?;
            buf.put_i32_le(value as i32);
        }
        FieldType::Sfixed64 => {
            let value = signed_value(tag, value, i64::MIN, i64::MAX)?;
            buf.put_i64_le(value);
        }
        FieldType::Fixed32 => {
            let value = unsigned_value(tag, value, u64::from(u32::MAX))?;
            buf.put_u32_le(value as u32);
        }
        FieldType::Fixed64 => {
            let value = unsigned_value(tag, value, u64::MAX)?;
            buf.put_u64_le(value);
        }
        FieldType::Float => {
            // Integers widen to float; anything else must already be one.
            let value = match value {
                Value::Float(value) => *value,
                Value::Int(value) => *value as f32,
                Value::Uint(value) => *value as f32,
                _ => return Err(mismatch(tag, "float")),
            };
            buf.put_f32_le(value);
        }
        FieldType::Double => {
            let value = match value {
                Value::Double(value) => *value,
                Value::Int(value) => *value as f64,
                Value::Uint(value) => *value as f64,
                _ => return Err(mismatch(tag, "double")),
            };
            buf.put_f64_le(value);
        }
        FieldType::Bytes => {
            let data = value.as_bytes().ok_or_else(|| mismatch(tag, "bytes"))?;
            varint::encode_uvarint(data.len() as u64, buf);
            buf.put_slice(data);
        }
        FieldType::Str => {
            let text = value.as_str().ok_or_else(|| mismatch(tag, "str"))?;
            varint::encode_uvarint(text.len() as u64, buf);
            buf.put_slice(text.as_bytes());
        }
        FieldType::Message(nested) => {
            let payload = value.as_message().ok_or_else(|| mismatch(tag, "message"))?;
            let mut body = Vec::new();
            encode_fields(nested, payload, width, &mut body)?;
            varint::encode_uvarint(body.len() as u64, buf);
            buf.put_slice(&body);
        }
    }
    Ok(())
}

fn signed_value(tag: u32, value: &Value, min: i64, max: i64) -> Result<i64, CodecError> {
    let value = match value {
        Value::Int(value) => *value,
        Value::Uint(value) if *value <= max as u64 => *value as i64,
        Value::Uint(_) => return Err(CodecError::ValueOutOfRange { tag }),
        _ => return Err(mismatch(tag, "int")),
    };
    if value < min || value > max {
        return Err(CodecError::ValueOutOfRange { tag });
    }
    Ok(value)
}

fn unsigned_value(tag: u32, value: &Value, max: u64) -> Result<u64, CodecError> {
    let value = match value {
        Value::Uint(value) => *value,
        Value::Int(value) if *value >= 0 => *value as u64,
        Value::Int(_) => return Err(CodecError::ValueOutOfRange { tag }),
        _ => return Err(mismatch(tag, "uint")),
    };
    if value > max {
        return Err(CodecError::ValueOutOfRange { tag });
    }
    Ok(value)
}

fn mismatch(tag: u32, expected: &'static str) -> CodecError {
    CodecError::ValueTypeMismatch { tag, expected }
}

#[cfg(test)]
mod tests {
    use crate::schema::Schema;
    use crate::value::{Payload, Value};

    #[test]
    fn test_required_missing() {
        let schema = Schema::parse("*U").unwrap();
        let err = schema.encode(&Payload::seq([Value::None])).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CodecError::RequiredFieldMissing { tag: 1, .. }
        ));
    }

    #[test]
    fn test_placeholder_slot_must_be_none() {
        let schema = Schema::parse("xU").unwrap();
        let err = schema
            .encode(&Payload::seq([Value::Uint(1), Value::from("hi")]))
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::CodecError::ValueTypeMismatch { tag: 1, .. }
        ));
    }

    #[test]
    fn test_payload_length_checked() {
        let schema = Schema::parse("V2").unwrap();
        let err = schema.encode(&Payload::seq([Value::Uint(321)])).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CodecError::PayloadLength {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_int_widens_to_float() {
        let schema = Schema::parse("f").unwrap();
        let encoded = schema.encode(&Payload::seq([Value::Int(2)])).unwrap();
        assert_eq!(encoded, [0x0d, 0x00, 0x00, 0x00, 0x40]);
    }

    #[test]
    fn test_float_rejected_for_int() {
        let schema = Schema::parse("t").unwrap();
        let err = schema.encode(&Payload::seq([Value::Float(1.0)])).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CodecError::ValueTypeMismatch { .. }
        ));
    }

    #[test]
    fn test_negative_rejected_for_unsigned() {
        let schema = Schema::parse("T").unwrap();
        let err = schema.encode(&Payload::seq([Value::Int(-5)])).unwrap_err();
        assert_eq!(err, crate::error::CodecError::ValueOutOfRange { tag: 1 });
    }

    #[test]
    fn test_fixed_range_checked() {
        let schema = Schema::parse("I").unwrap();
        let err = schema
            .encode(&Payload::seq([Value::Uint(u64::from(u32::MAX) + 1)]))
            .unwrap_err();
        assert_eq!(err, crate::error::CodecError::ValueOutOfRange { tag: 1 });
    }
}
