//! JSON representation of format schemas
//!
//! ```json
//! {
//!   "name": "camera-set",
//!   "littleEndian": true,
//!   "cryptoMode": "none",
//!   "fields": [
//!     { "name": "tag", "type": "CONSTANT", "size": 4, "constantValue": "0x[43 41 4D 00]" },
//!     { "name": "count", "type": "INTEGER", "size": 4 },
//!     { "name": "views", "type": "REPEATER", "size": "=?count?", "subFields": [
//!       { "name": "id", "type": "INTEGER", "size": 2, "signed": true },
//!       { "name": "fov", "type": "FPOINT", "size": 2, "isHalfFloat": true }
//!     ]}
//!   ]
//! }
//! ```

use crate::codec;
use crate::error::{FormatError, Result};
use crate::schema::types::{FieldDescriptor, FieldKind, FieldType, SizeSpec};
use serde::Deserialize;
use tdukit_crypto::EncryptionMode;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SchemaDocument {
    pub name: String,
    #[serde(default)]
    pub little_endian: bool,
    #[serde(default)]
    pub crypto_mode: EncryptionMode,
    pub fields: Vec<FieldDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum SizeValue {
    Number(usize),
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FieldDocument {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub size: Option<SizeValue>,
    #[serde(default)]
    pub signed: bool,
    #[serde(default)]
    pub is_half_float: bool,
    #[serde(default)]
    pub constant_value: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub is_link_source: bool,
    #[serde(default)]
    pub is_link_target: bool,
    #[serde(default)]
    pub sub_fields: Vec<FieldDocument>,
}

impl SizeValue {
    fn to_spec(&self) -> Result<SizeSpec> {
        match self {
            Self::Number(size) => Ok(SizeSpec::Literal(*size)),
            Self::Text(text) => SizeSpec::parse(text),
        }
    }
}

impl TryFrom<FieldDocument> for FieldDescriptor {
    type Error = FormatError;

    fn try_from(doc: FieldDocument) -> Result<Self> {
        let name = doc.name;
        let invalid = |message: &str| FormatError::InvalidSchema(format!("field '{name}': {message}"));

        if doc.field_type != FieldType::Repeater && !doc.sub_fields.is_empty() {
            return Err(invalid("only REPEATER fields may declare subFields"));
        }
        if doc.signed && doc.field_type != FieldType::Integer {
            return Err(invalid("only INTEGER fields may be signed"));
        }
        if doc.is_half_float && doc.field_type != FieldType::FloatingPoint {
            return Err(invalid("only FPOINT fields may be half floats"));
        }
        if doc.constant_value.is_some() && doc.field_type != FieldType::Constant {
            return Err(invalid("only CONSTANT fields may declare constantValue"));
        }

        let size = doc.size.as_ref().map(SizeValue::to_spec).transpose()?;
        let scalar_size = || size.clone().ok_or_else(|| invalid("missing size"));

        let kind = match doc.field_type {
            FieldType::Text => FieldKind::Text {
                size: scalar_size()?,
            },
            FieldType::Integer => FieldKind::Integer {
                size: scalar_size()?,
                signed: doc.signed,
            },
            FieldType::FloatingPoint => FieldKind::FloatingPoint {
                size: scalar_size()?,
                half: doc.is_half_float,
            },
            FieldType::Delimiter => FieldKind::Delimiter {
                size: scalar_size()?,
            },
            FieldType::Gap => FieldKind::Gap {
                size: scalar_size()?,
            },
            FieldType::Unknown => FieldKind::Unknown {
                size: scalar_size()?,
            },
            FieldType::Constant => {
                let value = doc
                    .constant_value
                    .as_deref()
                    .ok_or_else(|| invalid("missing constantValue"))?;
                let expected = codec::from_hex_string(value)?;
                let size = size
                    .clone()
                    .unwrap_or(SizeSpec::Literal(expected.len()));
                FieldKind::Constant { size, expected }
            }
            FieldType::Repeater => {
                if doc.sub_fields.is_empty() {
                    return Err(invalid("REPEATER needs subFields"));
                }
                let fields = doc
                    .sub_fields
                    .into_iter()
                    .map(FieldDescriptor::try_from)
                    .collect::<Result<Vec<_>>>()?;
                FieldKind::Repeater {
                    count: size.clone(),
                    fields,
                }
            }
        };

        Ok(Self {
            name,
            kind,
            condition: doc.condition.filter(|c| !c.trim().is_empty()),
            link_source: doc.is_link_source,
            link_target: doc.is_link_target,
        })
    }
}
