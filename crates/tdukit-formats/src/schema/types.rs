use crate::error::{FormatError, Result};
use std::fmt;

/// Byte count of a field, or repetition count of a repeater
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeSpec {
    /// Fixed value
    Literal(usize),
    /// `=`-prefixed formula resolved against already parsed fields
    Formula(String),
}

impl SizeSpec {
    /// Parse a size attribute: a decimal literal or a `=` formula
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        if trimmed.starts_with('=') {
            return Ok(Self::Formula(trimmed.to_string()));
        }
        trimmed
            .parse::<usize>()
            .map(Self::Literal)
            .map_err(|_| FormatError::InvalidFormat(format!("invalid size literal '{spec}'")))
    }

    /// The literal value, if this size is not computed
    #[must_use]
    pub fn literal(&self) -> Option<usize> {
        match self {
            Self::Literal(size) => Some(*size),
            Self::Formula(_) => None,
        }
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(size) => write!(f, "{size}"),
            Self::Formula(formula) => f.write_str(formula),
        }
    }
}

/// Field type tag, as written in schema documents and dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// Single-byte charset text
    Text,
    /// Signed or unsigned integer of 1, 2, 4 or 8 bytes
    Integer,
    /// 32-bit float or 16-bit half float
    #[serde(rename = "FPOINT")]
    FloatingPoint,
    /// Separator bytes kept verbatim
    Delimiter,
    /// Group of sub-fields read several times
    Repeater,
    /// Padding kept verbatim
    Gap,
    /// Bytes that must hold a declared value
    Constant,
    /// Bytes whose meaning is not known
    Unknown,
}

impl FieldType {
    /// Name used in schema documents
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::FloatingPoint => "FPOINT",
            Self::Delimiter => "DELIMITER",
            Self::Repeater => "REPEATER",
            Self::Gap => "GAP",
            Self::Constant => "CONSTANT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific attributes of a field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Text of `size` characters
    Text {
        /// Byte count
        size: SizeSpec,
    },
    /// Integer
    Integer {
        /// Byte count (1, 2, 4 or 8)
        size: SizeSpec,
        /// Two's complement when set
        signed: bool,
    },
    /// Floating point value
    FloatingPoint {
        /// Byte count (4, or 2 for half floats)
        size: SizeSpec,
        /// IEEE-754 half precision
        half: bool,
    },
    /// Separator bytes
    Delimiter {
        /// Byte count
        size: SizeSpec,
    },
    /// Padding bytes
    Gap {
        /// Byte count
        size: SizeSpec,
    },
    /// Bytes with a fixed expected value
    Constant {
        /// Byte count
        size: SizeSpec,
        /// Expected contents
        expected: Vec<u8>,
    },
    /// Opaque bytes
    Unknown {
        /// Byte count
        size: SizeSpec,
    },
    /// Repeated group
    Repeater {
        /// Number of repetitions; `None` repeats until the input ends
        count: Option<SizeSpec>,
        /// Layout of one repetition
        fields: Vec<FieldDescriptor>,
    },
}

impl FieldKind {
    /// Type tag of this kind
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Text { .. } => FieldType::Text,
            Self::Integer { .. } => FieldType::Integer,
            Self::FloatingPoint { .. } => FieldType::FloatingPoint,
            Self::Delimiter { .. } => FieldType::Delimiter,
            Self::Gap { .. } => FieldType::Gap,
            Self::Constant { .. } => FieldType::Constant,
            Self::Unknown { .. } => FieldType::Unknown,
            Self::Repeater { .. } => FieldType::Repeater,
        }
    }

    /// Byte size attribute of a scalar field, `None` for repeaters
    #[must_use]
    pub fn size(&self) -> Option<&SizeSpec> {
        match self {
            Self::Text { size }
            | Self::Integer { size, .. }
            | Self::FloatingPoint { size, .. }
            | Self::Delimiter { size }
            | Self::Gap { size }
            | Self::Constant { size, .. }
            | Self::Unknown { size } => Some(size),
            Self::Repeater { .. } => None,
        }
    }

    /// Whether values of this kind are integers interpreted as two's complement
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Integer { signed: true, .. })
    }

    /// Whether byte order applies to values of this kind
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer { .. } | Self::FloatingPoint { .. })
    }
}

/// One entry of a format schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Field name, unique within its level
    pub name: String,
    /// Type and type-specific attributes
    pub kind: FieldKind,
    /// Comparison gating the field; absent fields consume no bytes
    pub condition: Option<String>,
    /// Field holds a pointer to another field
    pub link_source: bool,
    /// Field is the landing point of a pointer
    pub link_target: bool,
}

impl FieldDescriptor {
    /// Create a plain field
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            condition: None,
            link_source: false,
            link_target: false,
        }
    }

    /// Gate this field behind a condition
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Mark this field as a pointer
    #[must_use]
    pub fn as_link_source(mut self) -> Self {
        self.link_source = true;
        self
    }

    /// Mark this field as a pointer destination
    #[must_use]
    pub fn as_link_target(mut self) -> Self {
        self.link_target = true;
        self
    }

    /// Type tag of this field
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.kind.field_type()
    }
}
