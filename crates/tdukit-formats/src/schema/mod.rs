//! Format schemas: declarative descriptions of binary layouts
//!
//! A schema is an ordered list of [`FieldDescriptor`]s. Each descriptor names
//! a field, its [`FieldKind`] (type plus size and type-specific flags), an
//! optional gating condition and its role in pointer links. Repeaters nest a
//! sub-schema describing one repetition.
//!
//! Schemas are loaded once per file kind, usually from JSON, and are
//! immutable afterwards; they can be shared freely between threads.

mod document;
mod types;

pub use types::{FieldDescriptor, FieldKind, FieldType, SizeSpec};

use crate::error::{FormatError, Result};
use document::SchemaDocument;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tdukit_crypto::EncryptionMode;

/// Layout description for one kind of file
#[derive(Debug, Clone, PartialEq)]
pub struct FormatSchema {
    name: String,
    little_endian: bool,
    encryption: EncryptionMode,
    fields: Vec<FieldDescriptor>,
}

impl FormatSchema {
    /// Create a big-endian, unencrypted schema
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            name: name.into(),
            little_endian: false,
            encryption: EncryptionMode::None,
            fields,
        }
    }

    /// Set the byte order of numeric fields
    #[must_use]
    pub fn with_little_endian(mut self, little_endian: bool) -> Self {
        self.little_endian = little_endian;
        self
    }

    /// Set the cipher mode files of this kind are stored with
    #[must_use]
    pub fn with_encryption(mut self, mode: EncryptionMode) -> Self {
        self.encryption = mode;
        self
    }

    /// Load and validate a schema from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Load and validate a schema from a JSON reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let document: SchemaDocument = serde_json::from_reader(reader)?;
        Self::from_document(document)
    }

    /// Load and validate a schema from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    fn from_document(document: SchemaDocument) -> Result<Self> {
        let fields = document
            .fields
            .into_iter()
            .map(FieldDescriptor::try_from)
            .collect::<Result<Vec<_>>>()?;

        let schema = Self {
            name: document.name,
            little_endian: document.little_endian,
            encryption: document.crypto_mode,
            fields,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Schema name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether numeric fields are stored little-endian
    #[must_use]
    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    /// Cipher mode declared for this kind of file
    #[must_use]
    pub fn encryption(&self) -> EncryptionMode {
        self.encryption
    }

    /// Top-level fields in layout order
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Top-level field by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Total number of descriptors, nested ones included
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        fn count(fields: &[FieldDescriptor]) -> usize {
            fields
                .iter()
                .map(|f| match &f.kind {
                    FieldKind::Repeater { fields, .. } => 1 + count(fields),
                    _ => 1,
                })
                .sum()
        }
        count(&self.fields)
    }

    /// Check structural consistency of the descriptors
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(FormatError::InvalidSchema(format!(
                "schema '{}' has no fields",
                self.name
            )));
        }
        validate_level(&self.fields)
    }
}

fn validate_level(fields: &[FieldDescriptor]) -> Result<()> {
    let mut names = HashSet::new();

    for field in fields {
        let invalid =
            |message: &str| FormatError::InvalidSchema(format!("field '{}': {message}", field.name));

        if field.name.is_empty()
            || field
                .name
                .chars()
                .any(|c| matches!(c, '.' | '[' | ']' | '?'))
        {
            return Err(invalid("names must be non-empty and free of '.', '[', ']' and '?'"));
        }
        if !names.insert(field.name.as_str()) {
            return Err(invalid("duplicate name at this level"));
        }
        if field.link_source && !matches!(field.kind, FieldKind::Integer { .. }) {
            return Err(invalid("only INTEGER fields may be link sources"));
        }
        if field.link_target && matches!(field.kind, FieldKind::Repeater { .. }) {
            return Err(invalid("a REPEATER cannot be a link target, mark its first sub-field instead"));
        }

        match &field.kind {
            FieldKind::FloatingPoint { size, half } => match (size.literal(), *half) {
                (Some(2), true) | (Some(4), false) | (None, _) => {}
                _ => return Err(invalid("FPOINT is 4 bytes, or 2 bytes as a half float")),
            },
            FieldKind::Integer { size, .. } => {
                if let Some(literal) = size.literal()
                    && !matches!(literal, 1 | 2 | 4 | 8)
                {
                    return Err(invalid("INTEGER is 1, 2, 4 or 8 bytes"));
                }
            }
            FieldKind::Constant { size, expected } => {
                if let Some(literal) = size.literal()
                    && literal != expected.len()
                {
                    return Err(invalid("constantValue length disagrees with size"));
                }
            }
            FieldKind::Repeater { fields, .. } => {
                if fields.is_empty() {
                    return Err(invalid("REPEATER needs sub-fields"));
                }
                validate_level(fields)?;
            }
            FieldKind::Text { .. }
            | FieldKind::Delimiter { .. }
            | FieldKind::Gap { .. }
            | FieldKind::Unknown { .. } => {}
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::io::Write;

    const CAMERA_SCHEMA: &str = r#"{
        "name": "camera-set",
        "littleEndian": true,
        "cryptoMode": "savegame",
        "fields": [
            { "name": "tag", "type": "CONSTANT", "constantValue": "0x[43 41 4D 00]" },
            { "name": "count", "type": "INTEGER", "size": 4 },
            { "name": "views", "type": "REPEATER", "size": "=?count?", "subFields": [
                { "name": "id", "type": "INTEGER", "size": "2", "signed": true },
                { "name": "fov", "type": "FPOINT", "size": 2, "isHalfFloat": true },
                { "name": "label", "type": "TEXT", "size": "=?id?+1" }
            ]},
            { "name": "extra", "type": "GAP", "size": 2, "condition": "?count?>1" }
        ]
    }"#;

    #[test]
    fn test_load_from_json() {
        let schema = FormatSchema::from_json_str(CAMERA_SCHEMA).expect("Test operation should succeed");

        assert_eq!(schema.name(), "camera-set");
        assert!(schema.is_little_endian());
        assert_eq!(schema.encryption(), EncryptionMode::SaveGame);
        assert_eq!(schema.fields().len(), 4);
        assert_eq!(schema.descriptor_count(), 7);

        let tag = schema.field("tag").expect("Test operation should succeed");
        assert_eq!(
            tag.kind,
            FieldKind::Constant {
                size: SizeSpec::Literal(4),
                expected: b"CAM\0".to_vec()
            }
        );

        let views = schema.field("views").expect("Test operation should succeed");
        match &views.kind {
            FieldKind::Repeater { count, fields } => {
                assert_eq!(count, &Some(SizeSpec::Formula("=?count?".to_string())));
                assert_eq!(fields.len(), 3);
                assert!(fields[0].kind.is_signed());
                assert_eq!(
                    fields[1].kind,
                    FieldKind::FloatingPoint {
                        size: SizeSpec::Literal(2),
                        half: true
                    }
                );
            }
            other => panic!("unexpected kind {other:?}"),
        }

        let extra = schema.field("extra").expect("Test operation should succeed");
        assert_eq!(extra.condition.as_deref(), Some("?count?>1"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().expect("Test operation should succeed");
        file.write_all(CAMERA_SCHEMA.as_bytes())
            .expect("Test operation should succeed");

        let schema = FormatSchema::from_path(file.path()).expect("Test operation should succeed");
        assert_eq!(schema.name(), "camera-set");
    }

    #[test]
    fn test_defaults() {
        let schema = FormatSchema::from_json_str(
            r#"{"name": "plain", "fields": [{"name": "a", "type": "UNKNOWN", "size": 3}]}"#,
        )
        .expect("Test operation should succeed");
        assert!(!schema.is_little_endian());
        assert_eq!(schema.encryption(), EncryptionMode::None);
    }

    #[test]
    fn test_rejects_inconsistent_documents() {
        let cases = [
            r#"{"name": "s", "fields": []}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "TEXT"}]}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "REPEATER", "size": 2}]}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "TEXT", "size": 2, "subFields": [{"name": "b", "type": "GAP", "size": 1}]}]}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "GAP", "size": 1}, {"name": "a", "type": "GAP", "size": 1}]}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "TEXT", "size": 4, "isLinkSource": true}]}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "INTEGER", "size": 3}]}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "FPOINT", "size": 4, "isHalfFloat": true}]}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "CONSTANT", "size": 2, "constantValue": "0x[01]"}]}"#,
            r#"{"name": "s", "fields": [{"name": "a.b", "type": "GAP", "size": 1}]}"#,
            r#"{"name": "s", "fields": [{"name": "a", "type": "TEXT", "size": 1, "signed": true}]}"#,
            r#"{"name": "s", "fields": [{"name": "p", "type": "INTEGER", "size": 1, "isLinkSource": true}, {"name": "a", "type": "REPEATER", "size": 1, "isLinkTarget": true, "subFields": [{"name": "v", "type": "INTEGER", "size": 1}]}]}"#,
        ];

        for case in cases {
            assert!(
                matches!(
                    FormatSchema::from_json_str(case),
                    Err(FormatError::InvalidSchema(_))
                ),
                "document should be rejected: {case}"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            FormatSchema::from_json_str(r#"{"name": "s", "fields": [{"name": "a", "type": "BLOB"}]}"#),
            Err(FormatError::Json(_))
        ));
        assert!(matches!(
            FormatSchema::from_json_str(
                r#"{"name": "s", "fields": [{"name": "a", "type": "CONSTANT", "constantValue": "01 02"}]}"#
            ),
            Err(FormatError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_programmatic_schema() {
        let schema = FormatSchema::new(
            "built",
            vec![FieldDescriptor::new(
                "value",
                FieldKind::Integer {
                    size: SizeSpec::Literal(4),
                    signed: false,
                },
            )],
        )
        .with_little_endian(true);

        assert!(schema.validate().is_ok());
        assert!(schema.is_little_endian());
    }
}
