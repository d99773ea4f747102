//! Compiler for the key/value schema surface.
//!
//! Entries come in three shapes: a named scalar with a type code, a named
//! nested schema, and a named nested schema with an explicit cardinality
//! prefix code. Each entry consumes one tag slot (the `x` placeholder may
//! consume several via its count suffix); names must be unique.

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::format::parse_seek;
use super::{Cardinality, FieldDescriptor, FieldSet, FieldType, FieldVec};
use crate::error::SchemaError;

/// One entry of a key/value schema.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldSpec {
    /// A scalar field: name plus a type code such as `"U"`, `"*t"`,
    /// `"x3"`, or `"V@2"`.
    Scalar { name: Box<str>, code: Box<str> },
    /// A singular nested message.
    Nested {
        name: Box<str>,
        entries: Vec<FieldSpec>,
    },
    /// A nested message with an explicit prefix code: one of `[`, `*[`,
    /// `+[`, `#[` (or the packed-repeated spellings `*+[` / `+*[`),
    /// optionally followed by a `@N` seek.
    PrefixedNested {
        name: Box<str>,
        prefix: Box<str>,
        entries: Vec<FieldSpec>,
    },
}

impl FieldSpec {
    pub fn scalar(name: &str, code: &str) -> FieldSpec {
        FieldSpec::Scalar {
            name: name.into(),
            code: code.into(),
        }
    }

    pub fn nested<I: IntoIterator<Item = FieldSpec>>(name: &str, entries: I) -> FieldSpec {
        FieldSpec::Nested {
            name: name.into(),
            entries: entries.into_iter().collect(),
        }
    }

    pub fn nested_with<I: IntoIterator<Item = FieldSpec>>(
        name: &str,
        prefix: &str,
        entries: I,
    ) -> FieldSpec {
        FieldSpec::PrefixedNested {
            name: name.into(),
            prefix: prefix.into(),
            entries: entries.into_iter().collect(),
        }
    }

    fn name(&self) -> &str {
        match self {
            FieldSpec::Scalar { name, .. }
            | FieldSpec::Nested { name, .. }
            | FieldSpec::PrefixedNested { name, .. } => name,
        }
    }
}

pub(crate) fn parse_fields(entries: &[FieldSpec]) -> Result<FieldSet, SchemaError> {
    let mut fields = FieldVec::new();
    let mut tag = 1u32;

    for entry in entries {
        let name: Box<str> = entry.name().into();
        let field = match entry {
            FieldSpec::Scalar { code, .. } => compile_scalar(name, code, &mut tag)?,
            FieldSpec::Nested { entries, .. } => {
                let nested = compile_nested(&name, entries)?;
                let field = FieldDescriptor {
                    tag,
                    name: Some(name),
                    ty: FieldType::Message(nested.into()),
                    cardinality: Cardinality::Optional,
                    count: 1,
                };
                tag += 1;
                field
            }
            FieldSpec::PrefixedNested {
                prefix, entries, ..
            } => {
                let (cardinality, seek) = parse_nested_prefix(&name, prefix)?;
                if let Some(seek) = seek {
                    tag = seek;
                }
                let nested = compile_nested(&name, entries)?;
                let field = FieldDescriptor {
                    tag,
                    name: Some(name),
                    ty: FieldType::Message(nested.into()),
                    cardinality,
                    count: 1,
                };
                tag += 1;
                field
            }
        };
        fields.push(field);
    }

    FieldSet::new(fields, true)
}

fn compile_nested(name: &str, entries: &[FieldSpec]) -> Result<FieldSet, SchemaError> {
    if entries.is_empty() {
        return Err(SchemaError::MissingNestedFields { name: name.into() });
    }
    parse_fields(entries)
}

/// Compiles a scalar type code: `prefix? seek? type count? seek?`.
fn compile_scalar(
    name: Box<str>,
    code: &str,
    tag: &mut u32,
) -> Result<FieldDescriptor, SchemaError> {
    let bytes = code.as_bytes();
    let mut pos = 0;

    let cardinality = match bytes.first() {
        Some(b'*') => {
            pos += 1;
            Cardinality::Required
        }
        Some(b'+') => {
            pos += 1;
            Cardinality::Repeated
        }
        Some(b'#') => {
            pos += 1;
            Cardinality::Packed
        }
        _ => Cardinality::Optional,
    };
    if matches!(bytes.get(pos), Some(b'*' | b'+' | b'#')) {
        return Err(SchemaError::DuplicatePrefix { pos });
    }

    if let Some(seek) = parse_seek(bytes, &mut pos, 0)? {
        *tag = seek;
    }

    if bytes.get(pos) == Some(&b'[') {
        // A nested opener in a plain type code has no schema to go with it.
        return Err(SchemaError::MissingNestedFields { name });
    }
    let ty = match code[pos..].chars().next() {
        Some(type_code) => FieldType::from_code(type_code)
            .ok_or(SchemaError::UnknownCode { code: type_code, pos })?,
        None => return Err(SchemaError::UnexpectedEnd { pos }),
    };
    pos += 1;

    let count_start = pos;
    let mut count = 1u32;
    while let Some(digit) = bytes.get(pos).filter(|byte| byte.is_ascii_digit()) {
        if pos == count_start {
            count = 0;
        }
        count = count
            .checked_mul(10)
            .and_then(|count| count.checked_add(u32::from(digit - b'0')))
            .ok_or(SchemaError::TagOutOfRange { tag: u64::MAX })?;
        pos += 1;
    }
    if pos != count_start {
        // Field copying is only meaningful for placeholder runs.
        if ty != FieldType::Skip {
            return Err(SchemaError::CountNotAllowed { name });
        }
        if count == 0 {
            return Err(SchemaError::InvalidCount { pos: count_start });
        }
    }

    if let Some(seek) = parse_seek(bytes, &mut pos, 0)? {
        *tag = seek;
    }

    if pos != bytes.len() {
        return Err(SchemaError::TrailingInput { name, pos });
    }

    let field = FieldDescriptor {
        tag: *tag,
        name: Some(name),
        ty,
        cardinality,
        count,
    };
    *tag = tag
        .checked_add(count)
        .ok_or(SchemaError::TagOutOfRange { tag: u64::from(*tag) + u64::from(count) })?;
    Ok(field)
}

/// Parses a nested prefix code such as `"+["` or `"#[@30"`.
fn parse_nested_prefix(
    name: &str,
    prefix: &str,
) -> Result<(Cardinality, Option<u32>), SchemaError> {
    let bytes = prefix.as_bytes();
    let mut pos = 0;
    let mut required = false;
    let mut repeated = false;
    let mut packed = false;

    while let Some(byte) = bytes.get(pos) {
        match byte {
            b'*' if !required => required = true,
            b'+' if !repeated => repeated = true,
            b'#' if !packed => packed = true,
            b'*' | b'+' | b'#' => return Err(SchemaError::DuplicatePrefix { pos }),
            _ => break,
        }
        pos += 1;
    }

    let cardinality = match (required, repeated, packed) {
        (_, _, true) | (true, true, _) => Cardinality::Packed,
        (false, true, false) => Cardinality::Repeated,
        (true, false, false) => Cardinality::Required,
        (false, false, false) => Cardinality::Optional,
    };

    if bytes.get(pos) != Some(&b'[') {
        return Err(SchemaError::MissingNestedFields { name: name.into() });
    }
    pos += 1;

    let seek = parse_seek(bytes, &mut pos, 0)?;
    if pos != bytes.len() {
        return Err(SchemaError::TrailingInput {
            name: name.into(),
            pos,
        });
    }
    Ok((cardinality, seek))
}
