//! Parser for the compact format-string schema surface.
//!
//! ```text
//! format   := element*
//! element  := prefix? type count? seek?
//!           | prefix? '[' format ']' count? seek?
//! prefix   := '*' | '+' | '#'
//! count    := DIGIT+              ; expands to that many consecutive fields
//! seek     := '@' DIGIT+          ; moves the running tag counter
//! ```
//!
//! Tags are assigned sequentially from 1 as elements are parsed; a seek sets
//! the current element's tag and counting continues from there. Overlapping
//! tag claims are rejected when the field set is built.

#![allow(clippy::as_conversions)]

use super::{Cardinality, FieldDescriptor, FieldSet, FieldType, FieldVec};
use crate::error::SchemaError;
use crate::wire::MAXIMUM_TAG_VAL;

pub(crate) fn parse(fmt: &str) -> Result<FieldSet, SchemaError> {
    parse_at(fmt, 0)
}

/// Parses one (possibly nested) format string. `base` is the offset of
/// `fmt` within the outermost string, so error positions stay absolute.
fn parse_at(fmt: &str, base: usize) -> Result<FieldSet, SchemaError> {
    let bytes = fmt.as_bytes();
    let mut fields = FieldVec::new();
    let mut pos = 0;
    let mut tag = 1u32;

    while pos < bytes.len() {
        let cardinality = parse_prefix(bytes, &mut pos, base)?;

        if bytes.get(pos) == Some(&b'[') {
            let open = pos;
            let close =
                match_bracket(bytes, open).ok_or(SchemaError::UnmatchedBracket { pos: base + open })?;
            let inner = &fmt[open + 1..close];
            if inner.is_empty() {
                return Err(SchemaError::EmptyGroup { pos: base + open });
            }
            let nested = parse_at(inner, base + open + 1)?;
            pos = close + 1;

            let count = parse_count(bytes, &mut pos, base)?;
            if let Some(seek) = parse_seek(bytes, &mut pos, base)? {
                tag = seek;
            }
            fields.push(FieldDescriptor {
                tag,
                name: None,
                ty: FieldType::Message(nested.into()),
                cardinality,
                count,
            });
            tag = advance_tag(tag, count)?;
            continue;
        }

        let code = match fmt[pos..].chars().next() {
            Some(code) => code,
            None => return Err(SchemaError::UnexpectedEnd { pos: base + pos }),
        };
        let ty = FieldType::from_code(code).ok_or(SchemaError::UnknownCode {
            code,
            pos: base + pos,
        })?;
        pos += 1;

        let count = parse_count(bytes, &mut pos, base)?;
        if let Some(seek) = parse_seek(bytes, &mut pos, base)? {
            tag = seek;
        }
        fields.push(FieldDescriptor {
            tag,
            name: None,
            ty,
            cardinality,
            count,
        });
        tag = advance_tag(tag, count)?;
    }

    FieldSet::new(fields, false)
}

/// Reads at most one cardinality prefix; a second one is an error.
fn parse_prefix(bytes: &[u8], pos: &mut usize, base: usize) -> Result<Cardinality, SchemaError> {
    let cardinality = match bytes.get(*pos) {
        Some(b'*') => Cardinality::Required,
        Some(b'+') => Cardinality::Repeated,
        Some(b'#') => Cardinality::Packed,
        _ => return Ok(Cardinality::Optional),
    };
    *pos += 1;
    if matches!(bytes.get(*pos), Some(b'*' | b'+' | b'#')) {
        return Err(SchemaError::DuplicatePrefix { pos: base + *pos });
    }
    Ok(cardinality)
}

/// Reads an optional count suffix. Defaults to 1; an explicit zero is
/// rejected.
fn parse_count(bytes: &[u8], pos: &mut usize, base: usize) -> Result<u32, SchemaError> {
    let start = *pos;
    match parse_digits(bytes, pos)? {
        Some(0) => Err(SchemaError::InvalidCount { pos: base + start }),
        Some(count) => Ok(count),
        None => Ok(1),
    }
}

/// Reads an optional `@N` seek. Seeking to tag zero or past the maximum tag
/// is rejected.
pub(super) fn parse_seek(
    bytes: &[u8],
    pos: &mut usize,
    base: usize,
) -> Result<Option<u32>, SchemaError> {
    if bytes.get(*pos) != Some(&b'@') {
        return Ok(None);
    }
    let at = *pos;
    *pos += 1;
    match parse_digits(bytes, pos)? {
        Some(0) => Err(SchemaError::InvalidSeek { pos: base + at }),
        Some(target) if target > MAXIMUM_TAG_VAL => {
            Err(SchemaError::TagOutOfRange { tag: u64::from(target) })
        }
        Some(target) => Ok(Some(target)),
        None => Err(SchemaError::InvalidSeek { pos: base + at }),
    }
}

fn parse_digits(bytes: &[u8], pos: &mut usize) -> Result<Option<u32>, SchemaError> {
    let start = *pos;
    let mut value = 0u64;
    while let Some(digit) = bytes.get(*pos).filter(|byte| byte.is_ascii_digit()) {
        value = value * 10 + u64::from(digit - b'0');
        if value > u64::from(u32::MAX) {
            return Err(SchemaError::TagOutOfRange { tag: value });
        }
        *pos += 1;
    }
    if *pos == start {
        Ok(None)
    } else {
        Ok(Some(value as u32))
    }
}

fn advance_tag(tag: u32, count: u32) -> Result<u32, SchemaError> {
    tag.checked_add(count)
        .ok_or(SchemaError::TagOutOfRange { tag: u64::from(tag) + u64::from(count) })
}

/// Finds the `]` matching the `[` at `open`, honoring nesting.
fn match_bracket(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in bytes[open..].iter().enumerate() {
        match byte {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_tags(fmt: &str) -> alloc::vec::Vec<u32> {
        parse(fmt).unwrap().iter().map(|field| field.tag).collect()
    }

    #[test]
    fn test_sequential_tags() {
        assert_eq!(field_tags("UtzbI"), [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_count_suffix_consumes_tags() {
        // x3 claims tags 1-3, the next field continues at 4.
        assert_eq!(field_tags("x3T"), [1, 4]);
        let root = parse("x3T").unwrap();
        assert_eq!(root.slot_count(), 4);
    }

    #[test]
    fn test_canonical_example() {
        let root = parse("*U*tU+[*Ut]").unwrap();
        let fields: alloc::vec::Vec<_> = root.iter().collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].cardinality, Cardinality::Required);
        assert_eq!(fields[0].ty, FieldType::Str);
        assert_eq!(fields[1].cardinality, Cardinality::Required);
        assert_eq!(fields[1].ty, FieldType::Int);
        assert_eq!(fields[2].cardinality, Cardinality::Optional);
        assert_eq!(fields[3].tag, 4);
        assert_eq!(fields[3].cardinality, Cardinality::Repeated);
        match &fields[3].ty {
            FieldType::Message(nested) => assert_eq!(nested.slot_count(), 2),
            other => panic!("expected nested field, got {other:?}"),
        }
    }

    #[test]
    fn test_aliases_resolve() {
        let root = parse("vVlLu").unwrap();
        let types: alloc::vec::Vec<_> = root.iter().map(|field| field.ty.clone()).collect();
        assert_eq!(
            types,
            [
                FieldType::Sint,
                FieldType::Uint,
                FieldType::Sfixed32,
                FieldType::Fixed32,
                FieldType::Str,
            ]
        );
    }

    #[test]
    fn test_nested_group_count_suffix() {
        // The group repeats twice, claiming tags 1 and 2.
        let root = parse("[U]2T").unwrap();
        let fields: alloc::vec::Vec<_> = root.iter().collect();
        assert_eq!(fields[0].count, 2);
        assert_eq!(fields[1].tag, 3);
        assert_eq!(root.slot_count(), 3);
    }

    #[test]
    fn test_seeks() {
        assert_eq!(field_tags("V2@2U@10U@20"), [2, 10, 20]);
        let root = parse("V2@2U@10U@20").unwrap();
        assert_eq!(root.slot_count(), 4);

        // Seek applies to the nested group itself.
        let root = parse("[vU@10]@20+[U@2]@30").unwrap();
        assert_eq!(
            root.iter().map(|field| field.tag).collect::<alloc::vec::Vec<_>>(),
            [20, 30]
        );
    }

    #[test]
    fn test_bad_format_strings() {
        assert!(matches!(
            parse("y"),
            Err(SchemaError::UnknownCode { code: 'y', pos: 0 })
        ));
        assert!(matches!(parse("++U"), Err(SchemaError::DuplicatePrefix { .. })));
        assert!(matches!(parse("+#U"), Err(SchemaError::DuplicatePrefix { .. })));
        assert!(matches!(parse("[U"), Err(SchemaError::UnmatchedBracket { pos: 0 })));
        assert!(matches!(parse("[]"), Err(SchemaError::EmptyGroup { pos: 0 })));
        assert!(matches!(parse("U0"), Err(SchemaError::InvalidCount { .. })));
        assert!(matches!(parse("U@"), Err(SchemaError::InvalidSeek { .. })));
        assert!(matches!(parse("U@0"), Err(SchemaError::InvalidSeek { .. })));
        assert!(matches!(parse("*"), Err(SchemaError::UnexpectedEnd { .. })));
    }

    #[test]
    fn test_overlap_detection() {
        assert!(matches!(parse("VU@1"), Err(SchemaError::TagOverlap { tag: 1, .. })));
        assert!(matches!(parse("V3@1U@2"), Err(SchemaError::TagOverlap { tag: 2, .. })));
        assert!(matches!(
            parse("V3@1U2@2"),
            Err(SchemaError::TagOverlap { tag: 2, count: 2, .. })
        ));
        assert!(matches!(
            parse("V@3U3@1"),
            Err(SchemaError::TagOverlap { tag: 1, count: 3, .. })
        ));
    }

    #[test]
    fn test_empty_format_is_valid() {
        let root = parse("").unwrap();
        assert_eq!(root.slot_count(), 0);
    }
}
