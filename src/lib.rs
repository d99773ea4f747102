//! Compact schema-driven codec for the Protocol Buffers wire format.
//!
//! Schemas are hand-written rather than generated from `.proto` files, which
//! keeps the codec small enough for resource-limited targets, quick protocol
//! prototyping, and reverse-engineering of unknown protobuf messages. A
//! schema comes in one of two equivalent surfaces: a compact format string,
//! or a key/value field list that names each field.
//!
//! ```
//! use picopb::{Payload, Schema, Value};
//!
//! let schema = Schema::parse("U")?;
//! let encoded = schema.encode(&Payload::seq([Value::from("Hello world!")]))?;
//! assert_eq!(encoded[..2], [0x0a, 0x0c]);
//!
//! let decoded = schema.decode(&encoded)?;
//! assert_eq!(decoded.at(0).and_then(Value::as_str), Some("Hello world!"));
//! # Ok::<(), picopb::Error>(())
//! ```
//!
//! The [`raw`] module additionally decodes messages without any schema,
//! yielding the tagged records as they appear on the wire.

#![no_std]
#![deny(clippy::as_conversions)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod error;
pub mod raw;
pub mod schema;
pub mod value;
pub mod varint;
pub mod wire;

mod cursor;
mod decode;
mod encode;

pub use error::{CodecError, Error, SchemaError};
pub use raw::{decode_raw, encode_raw, RawDecoder, RawRecord, RawValue};
pub use schema::{Cardinality, FieldSpec, Schema};
pub use value::{Payload, Value};
pub use varint::VintWidth;
pub use wire::WireType;

use alloc::vec::Vec;

/// Compiles `fmt` and encodes `payload` in one step.
pub fn encode(fmt: &str, payload: &Payload) -> Result<Vec<u8>, Error> {
    Ok(Schema::parse(fmt)?.encode(payload)?)
}

/// Compiles `fmt` and decodes `data` in one step.
pub fn decode(fmt: &str, data: &[u8]) -> Result<Payload, Error> {
    Ok(Schema::parse(fmt)?.decode(data)?)
}
