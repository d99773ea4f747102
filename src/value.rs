//! Dynamic values exchanged with the schema-driven codec.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use bytes::Bytes;

/// A single field value.
///
/// Signed semantic types (`t`, `z`, `i`, `q`) decode to [`Value::Int`],
/// unsigned ones (`T`, `I`, `Q`) to [`Value::Uint`]. Missing optional fields
/// and placeholder slots are [`Value::None`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value: a missing optional field or an `x` placeholder slot.
    None,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f32),
    Double(f64),
    Bytes(Bytes),
    Str(String),
    /// The elements of a repeated field.
    List(Vec<Value>),
    /// A nested message.
    Message(Payload),
}

impl Value {
    /// A short name for the variant, used in error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Message(_) => "message",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Payload> {
        match self {
            Value::Message(payload) => Some(payload),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Uint(u64::from(value))
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Uint(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(String::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Value::Bytes(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        Value::Message(payload)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Value::None,
        }
    }
}

/// A message payload in one of the two schema-surface shapes: an ordered
/// sequence (format-string schemas) or a name-to-value mapping (key/value
/// schemas).
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Payload {
    pub fn seq<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Payload::Seq(values.into_iter().map(Into::into).collect())
    }

    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Payload::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Entry at a position (sequence payloads only).
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Payload::Seq(values) => values.get(index),
            Payload::Map(_) => None,
        }
    }

    /// Entry by field name (mapping payloads only).
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Payload::Seq(_) => None,
            Payload::Map(entries) => entries.get(name),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Seq(values) => values.len(),
            Payload::Map(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
