//! Compiled schema representation and the two schema surfaces.
//!
//! A [`Schema`] is compiled once, is immutable apart from its configuration
//! knobs, and may be shared freely between concurrent encode and decode
//! calls.

#![allow(clippy::as_conversions)]

mod format;
mod kv;

pub use kv::FieldSpec;

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{CodecError, SchemaError};
use crate::value::Payload;
use crate::varint::VintWidth;
use crate::wire::{WireType, MAXIMUM_TAG_VAL};
use crate::{decode, encode};

#[cfg(feature = "smallvec")]
pub(crate) type FieldVec = smallvec::SmallVec<[FieldDescriptor; 4]>;

#[cfg(not(feature = "smallvec"))]
pub(crate) type FieldVec = Vec<FieldDescriptor>;

/// Cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Plain singular field; absent values are simply not emitted.
    Optional,
    /// Singular field that must be present (`*`).
    Required,
    /// Repeated field, one record per element (`+`).
    Repeated,
    /// Repeated field packed into one length-delimited record (`#`).
    Packed,
}

impl Cardinality {
    pub(crate) fn is_repeated(self) -> bool {
        matches!(self, Cardinality::Repeated | Cardinality::Packed)
    }
}

/// Semantic type of a field, resolved from its type code.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldType {
    /// `x`: consumes a tag and a payload slot, carries no value.
    Skip,
    /// `b`
    Bool,
    /// `t`: two's-complement signed varint.
    Int,
    /// `T` / `V`: unsigned varint.
    Uint,
    /// `z` / `v`: ZigZag signed varint.
    Sint,
    /// `i` / `l`
    Sfixed32,
    /// `I` / `L`
    Fixed32,
    /// `q`
    Sfixed64,
    /// `Q`
    Fixed64,
    /// `f`
    Float,
    /// `d`
    Double,
    /// `a`
    Bytes,
    /// `U` / `u`
    Str,
    /// `[ ... ]`
    Message(Box<FieldSet>),
}

impl FieldType {
    /// Resolves a type code, including its aliases.
    pub(crate) fn from_code(code: char) -> Option<FieldType> {
        match code {
            'x' => Some(FieldType::Skip),
            'b' => Some(FieldType::Bool),
            't' => Some(FieldType::Int),
            'T' | 'V' => Some(FieldType::Uint),
            'z' | 'v' => Some(FieldType::Sint),
            'i' | 'l' => Some(FieldType::Sfixed32),
            'I' | 'L' => Some(FieldType::Fixed32),
            'q' => Some(FieldType::Sfixed64),
            'Q' => Some(FieldType::Fixed64),
            'f' => Some(FieldType::Float),
            'd' => Some(FieldType::Double),
            'a' => Some(FieldType::Bytes),
            'U' | 'u' => Some(FieldType::Str),
            _ => None,
        }
    }

    /// The wire type values of this semantic type travel as. `None` for the
    /// placeholder type, which never reaches the wire.
    pub(crate) fn wire_type(&self) -> Option<WireType> {
        match self {
            FieldType::Skip => None,
            FieldType::Bool | FieldType::Int | FieldType::Uint | FieldType::Sint => {
                Some(WireType::Varint)
            }
            FieldType::Sfixed32 | FieldType::Fixed32 | FieldType::Float => Some(WireType::I32),
            FieldType::Sfixed64 | FieldType::Fixed64 | FieldType::Double => Some(WireType::I64),
            FieldType::Bytes | FieldType::Str | FieldType::Message(_) => Some(WireType::Len),
        }
    }
}

/// One compiled field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldDescriptor {
    /// First tag this field occupies.
    pub tag: u32,
    /// Field name; present only in key/value schemas.
    pub name: Option<Box<str>>,
    pub ty: FieldType,
    pub cardinality: Cardinality,
    /// Number of consecutive tags (and payload slots) this field expands to,
    /// from the count suffix. Usually 1.
    pub count: u32,
}

/// Maps a tag range onto a field and its run of payload slots.
#[derive(Debug, Clone, PartialEq)]
struct IndexEntry {
    start: u32,
    count: u32,
    field: u32,
    first_slot: u32,
}

/// An ordered, immutable set of compiled fields plus a tag lookup index.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FieldSet {
    fields: FieldVec,
    index: Vec<IndexEntry>,
    slots: u32,
    named: bool,
}

impl FieldSet {
    /// Validates tag ranges, overlaps, and (for key/value schemas) name
    /// uniqueness, then builds the lookup index.
    pub(crate) fn new(fields: FieldVec, named: bool) -> Result<Self, SchemaError> {
        let mut slots = 0u32;
        let mut index = Vec::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            let end = field
                .tag
                .checked_add(field.count - 1)
                .filter(|end| *end <= MAXIMUM_TAG_VAL)
                .ok_or(SchemaError::TagOutOfRange {
                    tag: u64::from(field.tag),
                })?;
            debug_assert!(end >= field.tag);
            index.push(IndexEntry {
                start: field.tag,
                count: field.count,
                field: position as u32,
                first_slot: slots,
            });
            slots = slots
                .checked_add(field.count)
                .ok_or(SchemaError::TagOutOfRange { tag: u64::from(end) })?;
        }

        index.sort_by_key(|entry| entry.start);
        for pair in index.windows(2) {
            if pair[0].start + pair[0].count > pair[1].start {
                // Report whichever of the two was declared later.
                let later = if pair[0].field > pair[1].field {
                    &pair[0]
                } else {
                    &pair[1]
                };
                let field = &fields[later.field as usize];
                return Err(SchemaError::TagOverlap {
                    tag: field.tag,
                    count: field.count,
                    name: field.name.clone(),
                });
            }
        }

        if named {
            for (position, field) in fields.iter().enumerate() {
                let name = field.name.as_deref().unwrap_or_default();
                if fields[..position]
                    .iter()
                    .any(|other| other.name.as_deref() == Some(name))
                {
                    return Err(SchemaError::DuplicateName { name: name.into() });
                }
            }
        }

        Ok(FieldSet {
            fields,
            index,
            slots,
            named,
        })
    }

    /// Finds the field covering `tag` and the payload slot that particular
    /// tag maps to.
    pub(crate) fn lookup(&self, tag: u32) -> Option<(&FieldDescriptor, u32)> {
        let position = self.index.partition_point(|entry| entry.start <= tag);
        let entry = &self.index[position.checked_sub(1)?];
        if tag < entry.start + entry.count {
            let field = &self.fields[entry.field as usize];
            Some((field, entry.first_slot + (tag - entry.start)))
        } else {
            None
        }
    }

    /// Total number of payload slots, counting expanded fields and `x`
    /// placeholders.
    pub(crate) fn slot_count(&self) -> usize {
        self.slots as usize
    }

    pub(crate) fn named(&self) -> bool {
        self.named
    }

    pub(crate) fn iter(&self) -> core::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }
}

/// A compiled schema: the field tree plus the codec configuration.
///
/// Compilation is total and side-effect-free; the same description always
/// yields a structurally identical schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    root: FieldSet,
    width: VintWidth,
    sparse: bool,
}

impl Schema {
    /// Compiles a compact format string, e.g. `"*U*tU+[*Ut]"`.
    pub fn parse(fmt: &str) -> Result<Schema, SchemaError> {
        Ok(Schema::with_root(format::parse(fmt)?))
    }

    /// Compiles a key/value field list.
    pub fn parse_fields(entries: &[FieldSpec]) -> Result<Schema, SchemaError> {
        Ok(Schema::with_root(kv::parse_fields(entries)?))
    }

    fn with_root(root: FieldSet) -> Schema {
        Schema {
            root,
            width: VintWidth::DEFAULT,
            sparse: false,
        }
    }

    /// True if this schema was built from a key/value field list and works
    /// with mapping payloads.
    pub fn kvfmt(&self) -> bool {
        self.root.named()
    }

    /// Number of payload slots a positional payload must fill, `x`
    /// placeholders included.
    pub fn slot_count(&self) -> usize {
        self.root.slot_count()
    }

    /// The two's-complement signed varint width used by `t` fields.
    pub fn vint_width(&self) -> VintWidth {
        self.width
    }

    pub fn set_vint_width(&mut self, width: VintWidth) {
        self.width = width;
    }

    /// Returns the schema with the given two's-complement varint width.
    pub fn with_vint_width(mut self, width: VintWidth) -> Schema {
        self.width = width;
        self
    }

    /// Whether decode elides absent optional keys from mapping payloads
    /// instead of inserting [`crate::Value::None`].
    pub fn allow_sparse_dict(&self) -> bool {
        self.sparse
    }

    pub fn set_allow_sparse_dict(&mut self, sparse: bool) {
        self.sparse = sparse;
    }

    /// Returns the schema with sparse mapping output enabled or disabled.
    pub fn with_sparse_dict(mut self, sparse: bool) -> Schema {
        self.sparse = sparse;
        self
    }

    /// Serializes `payload` to wire format, in declared field order.
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>, CodecError> {
        encode::encode_message(&self.root, payload, self.width)
    }

    /// Decodes wire data into a structured payload.
    pub fn decode(&self, data: &[u8]) -> Result<Payload, CodecError> {
        decode::decode_message(&self.root, data, self.width, self.sparse)
    }

    pub(crate) fn root(&self) -> &FieldSet {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_covers_counted_ranges() {
        // x3 at tags 1-3, T at tag 4.
        let schema = Schema::parse("x3T").unwrap();
        let root = schema.root();
        assert_eq!(root.slot_count(), 4);

        let (field, slot) = root.lookup(2).unwrap();
        assert_eq!(field.ty, FieldType::Skip);
        assert_eq!(slot, 1);

        let (field, slot) = root.lookup(4).unwrap();
        assert_eq!(field.ty, FieldType::Uint);
        assert_eq!(slot, 3);

        assert!(root.lookup(5).is_none());
    }

    #[test]
    fn test_lookup_with_seeks() {
        let schema = Schema::parse("U@10U@2").unwrap();
        let root = schema.root();
        assert!(root.lookup(1).is_none());
        assert_eq!(root.lookup(2).unwrap().1, 1);
        assert_eq!(root.lookup(10).unwrap().1, 0);
    }

    #[test]
    fn test_compilation_is_idempotent() {
        let first = Schema::parse("*U*tU+[*Ut]").unwrap();
        let second = Schema::parse("*U*tU+[*Ut]").unwrap();
        assert_eq!(first, second);
    }
}
