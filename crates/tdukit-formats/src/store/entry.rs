use crate::codec;
use crate::schema::FieldType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoded value of a field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    /// Text, NUL-padded to the field size
    Text(String),
    /// Integer; unsigned 64-bit values keep their bit pattern
    Integer(i64),
    /// Float or widened half float
    Float(#[serde(with = "json_float")] f32),
    /// Bytes kept verbatim (gaps, delimiters, constants, unknown data)
    Bytes(#[serde(with = "hex_bytes")] Vec<u8>),
    /// Number of repetitions realized by a repeater
    Repeated(usize),
}

impl FieldValue {
    /// Short name of the value's type
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bytes(_) => "bytes",
            Self::Repeated(_) => "repeater",
        }
    }

    /// Numeric view used by formulas
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(f64::from(*value)),
            Self::Repeated(count) => Some(*count as f64),
            Self::Text(_) | Self::Bytes(_) => None,
        }
    }
}

// Floats compare by bit pattern; any two NaNs are equal.
impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan()),
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Repeated(a), Self::Repeated(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "\"{}\"", text.trim_end_matches('\0')),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bytes(bytes) => f.write_str(&codec::to_hex_string(bytes)),
            Self::Repeated(count) => write!(f, "{count} item(s)"),
        }
    }
}

/// Stored state of one field: raw bytes plus interpreted value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    #[serde(rename = "type")]
    field_type: FieldType,
    size: usize,
    #[serde(default)]
    signed: bool,
    #[serde(with = "hex_bytes")]
    raw: Vec<u8>,
    value: FieldValue,
}

impl StoreEntry {
    /// Entry for a freshly decoded field
    pub fn new(field_type: FieldType, signed: bool, raw: Vec<u8>, value: FieldValue) -> Self {
        Self {
            field_type,
            size: raw.len(),
            signed,
            raw,
            value,
        }
    }

    /// Entry with no backing bytes yet, e.g. a value added by a patch
    pub fn detached(field_type: FieldType, signed: bool, value: FieldValue) -> Self {
        Self {
            field_type,
            size: 0,
            signed,
            raw: Vec::new(),
            value,
        }
    }

    /// Entry for a repeater's count metadata
    pub fn repeater(count: usize, span: usize) -> Self {
        Self {
            field_type: FieldType::Repeater,
            size: span,
            signed: false,
            raw: Vec::new(),
            value: FieldValue::Repeated(count),
        }
    }

    /// Field type
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Size in bytes when parsed (span of all repetitions for repeaters)
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the integer is two's complement
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Bytes as found in the stream
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Current value
    #[must_use]
    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    pub(crate) fn set_value(&mut self, value: FieldValue) {
        self.value = value;
    }

    pub(crate) fn set_span(&mut self, span: usize) {
        self.size = span;
    }
}

mod hex_bytes {
    use crate::codec;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&codec::to_hex_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        codec::from_hex_string(&text).map_err(serde::de::Error::custom)
    }
}

mod json_float {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f32),
        Text(String),
    }

    // JSON has no NaN or infinities; those travel as strings
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f32(*value)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => text.parse::<f32>().map_err(serde::de::Error::custom),
        }
    }
}
