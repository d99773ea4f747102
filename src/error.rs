//! Error types for schema compilation and the wire codec.

use core::fmt;

use alloc::boxed::Box;

use crate::wire::WireType;

/// Error raised when a schema description cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A character in a format string is not a known type code.
    UnknownCode { code: char, pos: usize },
    /// The schema text ended where a type code was expected.
    UnexpectedEnd { pos: usize },
    /// A `[` has no matching `]`.
    UnmatchedBracket { pos: usize },
    /// More than one of `*`, `+`, `#` applied to the same field.
    DuplicatePrefix { pos: usize },
    /// A nested group `[]` contains no fields.
    EmptyGroup { pos: usize },
    /// A count suffix of zero.
    InvalidCount { pos: usize },
    /// A `@` seek without digits, or seeking to tag zero.
    InvalidSeek { pos: usize },
    /// A tag (or the end of a counted range) falls outside `[1, 2^29 - 1]`.
    TagOutOfRange { tag: u64 },
    /// A field claims one or more tags already claimed by another field.
    TagOverlap {
        tag: u32,
        count: u32,
        name: Option<Box<str>>,
    },
    /// Two fields in a key/value schema share a name.
    DuplicateName { name: Box<str> },
    /// A count suffix on a non-placeholder field in a key/value schema.
    CountNotAllowed { name: Box<str> },
    /// A `[` prefix code without an accompanying nested schema, or a nested
    /// entry whose schema is empty.
    MissingNestedFields { name: Box<str> },
    /// Unparsed text left over after a key/value type code.
    TrailingInput { name: Box<str>, pos: usize },
    /// A two's-complement varint width that is zero, not a multiple of
    /// eight, or wider than 64 bits.
    InvalidWidth { bits: u32 },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::UnknownCode { code, pos } => {
                write!(f, "unknown type code {code:?} at position {pos}")
            }
            SchemaError::UnexpectedEnd { pos } => {
                write!(f, "format string ended unexpectedly at position {pos}")
            }
            SchemaError::UnmatchedBracket { pos } => {
                write!(f, "unmatched bracket at position {pos}")
            }
            SchemaError::DuplicatePrefix { pos } => {
                write!(f, "duplicate field prefix at position {pos}")
            }
            SchemaError::EmptyGroup { pos } => {
                write!(f, "empty nested group at position {pos}")
            }
            SchemaError::InvalidCount { pos } => {
                write!(f, "invalid count suffix at position {pos}")
            }
            SchemaError::InvalidSeek { pos } => {
                write!(f, "invalid field seek at position {pos}")
            }
            SchemaError::TagOutOfRange { tag } => {
                write!(f, "tag {tag} is outside the valid range")
            }
            SchemaError::TagOverlap { tag, count, name } => {
                write!(f, "multiple definitions found for tag {tag}")?;
                if *count > 1 {
                    write!(f, " or the {} tags after it", count - 1)?;
                }
                if let Some(name) = name {
                    write!(f, " ({name})")?;
                }
                Ok(())
            }
            SchemaError::DuplicateName { name } => {
                write!(f, "field name {name:?} is used more than once")
            }
            SchemaError::CountNotAllowed { name } => {
                write!(f, "count suffix not allowed on non-placeholder field {name:?}")
            }
            SchemaError::MissingNestedFields { name } => {
                write!(f, "nested field {name:?} has no nested schema")
            }
            SchemaError::TrailingInput { name, pos } => {
                write!(f, "unrecognized fragment at position {pos} in type code for {name:?}")
            }
            SchemaError::InvalidWidth { bits } => {
                write!(f, "invalid two's-complement varint width: {bits} bits")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SchemaError {}

/// Error raised while encoding or decoding wire data.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The input ended where more bytes were expected. `partial` is true if
    /// bytes were consumed past the last complete record boundary.
    EndOfMessage { partial: bool },
    /// A varint ran past its maximum encoded length without terminating.
    VarintOverflow,
    /// A wire type value of 6 or 7.
    InvalidWireType { value: u8 },
    /// The deprecated group encoding (wire types 3 and 4).
    GroupEncoding,
    /// A field number of zero or above `2^29 - 1`.
    InvalidTag { tag: u64 },
    /// A length prefix that does not fit in addressable memory.
    LengthOverflow { len: u64 },
    /// A record's wire type does not match the schema's expectation.
    WireTypeMismatch {
        tag: u32,
        expected: WireType,
        actual: WireType,
    },
    /// A record's tag is not declared in the schema.
    UnknownField { tag: u32 },
    /// A field marked required was missing or `None`.
    RequiredFieldMissing { tag: u32, name: Option<Box<str>> },
    /// A text field held invalid UTF-8.
    BadString,
    /// A numeric value does not fit the field's wire representation.
    ValueOutOfRange { tag: u32 },
    /// A payload value's variant does not match the field's semantic type.
    ValueTypeMismatch { tag: u32, expected: &'static str },
    /// A positional payload whose length differs from the schema's slot count.
    PayloadLength { expected: usize, actual: usize },
    /// A payload of the wrong shape (sequence vs. mapping) for the schema.
    PayloadShape { expected: &'static str },
}

impl CodecError {
    /// True if this is an [`CodecError::EndOfMessage`] that consumed bytes
    /// past the last complete record.
    pub fn is_partial(&self) -> bool {
        matches!(self, CodecError::EndOfMessage { partial: true })
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::EndOfMessage { partial: true } => {
                write!(f, "unexpected end of message (partial record)")
            }
            CodecError::EndOfMessage { partial: false } => {
                write!(f, "unexpected end of message")
            }
            CodecError::VarintOverflow => {
                write!(f, "varint exceeds maximum encoded length")
            }
            CodecError::InvalidWireType { value } => {
                write!(f, "invalid wire type value: {value}")
            }
            CodecError::GroupEncoding => {
                write!(f, "deprecated group encoding not supported")
            }
            CodecError::InvalidTag { tag } => {
                write!(f, "field number {tag} is outside the valid range")
            }
            CodecError::LengthOverflow { len } => {
                write!(f, "length prefix {len} exceeds addressable memory")
            }
            CodecError::WireTypeMismatch {
                tag,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "wire type mismatch on field {tag}: expected {expected:?}, got {actual:?}"
                )
            }
            CodecError::UnknownField { tag } => {
                write!(f, "field {tag} is not declared in the schema")
            }
            CodecError::RequiredFieldMissing { tag, name } => match name {
                Some(name) => write!(f, "required field {name:?} is missing"),
                None => write!(f, "required field {tag} is missing"),
            },
            CodecError::BadString => {
                write!(f, "invalid UTF-8 in text field")
            }
            CodecError::ValueOutOfRange { tag } => {
                write!(f, "value out of range for field {tag}")
            }
            CodecError::ValueTypeMismatch { tag, expected } => {
                write!(f, "field {tag} expects a {expected} value")
            }
            CodecError::PayloadLength { expected, actual } => {
                write!(f, "payload has {actual} entries, schema has {expected} slots")
            }
            CodecError::PayloadShape { expected } => {
                write!(f, "payload must be a {expected} for this schema")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

/// Either kind of failure, for callers that compile and run a schema in one
/// step.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Schema(SchemaError),
    Codec(CodecError),
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Error::Codec(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Schema(err) => err.fmt(f),
            Error::Codec(err) => err.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Schema(err) => Some(err),
            Error::Codec(err) => Some(err),
        }
    }
}
