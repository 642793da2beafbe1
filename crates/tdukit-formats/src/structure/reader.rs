use super::{is_present, resolve_size};
use crate::codec;
use crate::config::CodecConfig;
use crate::error::{FormatError, Result};
use crate::links::LinkRegistry;
use crate::schema::{FieldDescriptor, FieldKind, FormatSchema, SizeSpec};
use crate::store::{DataStore, FieldPath, FieldValue, StoreEntry};
use tracing::{debug, trace, warn};

/// Single-pass parser for one buffer
pub struct StructureReader<'a> {
    schema: &'a FormatSchema,
    config: &'a CodecConfig,
    data: &'a [u8],
    offset: usize,
    store: DataStore,
    links: LinkRegistry,
}

impl<'a> StructureReader<'a> {
    /// Prepare to parse `data` with `schema`
    pub fn new(schema: &'a FormatSchema, data: &'a [u8], config: &'a CodecConfig) -> Self {
        Self {
            schema,
            config,
            data,
            offset: 0,
            store: DataStore::new(),
            links: LinkRegistry::new(),
        }
    }

    /// Parse the whole buffer
    ///
    /// Links are validated once every field has been read.
    pub fn read(mut self) -> Result<DataStore> {
        debug!(
            "Parsing {} bytes with schema '{}'",
            self.data.len(),
            self.schema.name()
        );

        let schema = self.schema;
        self.read_fields(schema.fields(), &FieldPath::root())?;

        let remaining = self.remaining();
        if remaining > 0 {
            if !self.config.allow_trailing_bytes {
                return Err(FormatError::TrailingInput {
                    offset: self.offset,
                    remaining,
                });
            }
            debug!("Ignoring {} trailing bytes at offset {}", remaining, self.offset);
        }

        self.links.validate()?;

        debug!(
            "Parsed {} fields from {} bytes ({} links)",
            self.store.len(),
            self.offset,
            self.links.source_count()
        );
        self.store.set_links(self.links);
        Ok(self.store)
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, size: usize) -> Result<&'a [u8]> {
        let data = self.data;
        let available = self.remaining();
        if size > available {
            return Err(FormatError::TruncatedInput {
                offset: self.offset,
                needed: size,
                available,
            });
        }
        let bytes = &data[self.offset..self.offset + size];
        self.offset += size;
        Ok(bytes)
    }

    fn read_fields(&mut self, fields: &'a [FieldDescriptor], scope: &FieldPath) -> Result<()> {
        for field in fields {
            let path = scope.child(field.name.as_str());
            if !is_present(field, scope, &self.store)? {
                trace!("Skipping {} (condition not met)", path);
                continue;
            }

            match &field.kind {
                FieldKind::Repeater { count, fields } => {
                    self.read_repeater(count.as_ref(), fields, path, scope)?;
                }
                kind => self.read_scalar(field, kind, path, scope)?,
            }
        }
        Ok(())
    }

    fn read_scalar(
        &mut self,
        field: &FieldDescriptor,
        kind: &FieldKind,
        path: FieldPath,
        scope: &FieldPath,
    ) -> Result<()> {
        let size = match kind.size() {
            Some(spec) => resolve_size(spec, scope, &self.store)?,
            None => 0,
        };
        let offset = self.offset;
        let raw = self.take(size)?;
        trace!("{} at 0x{:X}, {} bytes", path, offset, size);

        if let FieldKind::Constant { expected, .. } = kind
            && raw != expected.as_slice()
        {
            return Err(FormatError::ConstantMismatch {
                path: path.to_string(),
                expected: codec::to_hex_string(expected),
                actual: codec::to_hex_string(raw),
            });
        }

        let value = codec::decode_field(kind, raw, self.schema.is_little_endian())?;

        if field.link_source
            && let FieldValue::Integer(address) = value
        {
            self.links.register_source(path.clone(), address as u64)?;
        }
        if field.link_target {
            self.links.register_target(path.clone(), offset as u64)?;
        }

        self.store.insert(
            path,
            StoreEntry::new(kind.field_type(), kind.is_signed(), raw.to_vec(), value),
        );
        Ok(())
    }

    fn read_repeater(
        &mut self,
        count: Option<&SizeSpec>,
        fields: &'a [FieldDescriptor],
        path: FieldPath,
        scope: &FieldPath,
    ) -> Result<()> {
        let start = self.offset;
        // Placeholder keeps the repeater ahead of its items in layout order
        self.store.insert(path.clone(), StoreEntry::repeater(0, 0));

        let realized = match count {
            Some(spec) => {
                let count = resolve_size(spec, scope, &self.store)?;
                self.check_repetitions(count)?;
                if count == 0 && self.remaining() > 0 {
                    warn!(
                        "{} has zero repetitions with {} bytes remaining",
                        path,
                        self.remaining()
                    );
                }
                for index in 0..count {
                    self.read_fields(fields, &path.indexed(index))?;
                }
                count
            }
            None => {
                let mut index = 0;
                while self.remaining() > 0 {
                    self.check_repetitions(index + 1)?;
                    let before = self.offset;
                    self.read_fields(fields, &path.indexed(index))?;
                    index += 1;
                    if self.offset == before {
                        return Err(FormatError::InvalidSchema(format!(
                            "{path} repeats until end of input but an item consumed no bytes"
                        )));
                    }
                }
                index
            }
        };

        let span = self.offset - start;
        trace!("{}: {} repetitions over {} bytes", path, realized, span);
        if let Some(entry) = self.store.get_mut(&path) {
            entry.set_value(FieldValue::Repeated(realized));
            entry.set_span(span);
        }
        Ok(())
    }

    fn check_repetitions(&self, count: usize) -> Result<()> {
        if count > self.config.max_repetitions {
            return Err(FormatError::InvalidSize {
                size: i64::try_from(count).unwrap_or(i64::MAX),
                reason: "repetition count exceeds the configured maximum",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const RECORDS: &str = r#"{
        "name": "records",
        "fields": [
            { "name": "magic", "type": "CONSTANT", "constantValue": "0x[52 45 43]" },
            { "name": "count", "type": "INTEGER", "size": 1 },
            { "name": "group", "type": "REPEATER", "size": "=?count?", "subFields": [
                { "name": "len", "type": "INTEGER", "size": 1 },
                { "name": "value", "type": "TEXT", "size": "=?len?" }
            ]}
        ]
    }"#;

    fn schema(json: &str) -> FormatSchema {
        FormatSchema::from_json_str(json).expect("Test operation should succeed")
    }

    fn read(schema: &FormatSchema, data: &[u8]) -> Result<DataStore> {
        StructureReader::new(schema, data, &CodecConfig::default()).read()
    }

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).expect("Test operation should succeed")
    }

    #[test]
    fn test_repeater_with_scoped_sizes() {
        let schema = schema(RECORDS);
        let data = b"REC\x02\x01A\x03BCD";
        let store = read(&schema, data).expect("Test operation should succeed");

        let paths: Vec<String> = store.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "magic",
                "count",
                "group",
                "group[0].len",
                "group[0].value",
                "group[1].len",
                "group[1].value",
            ]
        );
        assert_eq!(store.text(&path("group[1].value")).unwrap(), "BCD");
        assert_eq!(store.repeated_count(&path("group")).unwrap(), 2);
        assert_eq!(store.get(&path("group")).unwrap().size(), 6);
    }

    #[test]
    fn test_truncated_repetition() {
        let schema = schema(RECORDS);
        let err = read(&schema, b"REC\x02\x01A\x03BC").unwrap_err();
        assert!(matches!(
            err,
            FormatError::TruncatedInput { offset: 7, needed: 3, available: 2 }
        ));
    }

    #[test]
    fn test_constant_mismatch() {
        let schema = schema(RECORDS);
        assert!(matches!(
            read(&schema, b"RAC\x00"),
            Err(FormatError::ConstantMismatch { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let schema = schema(RECORDS);
        assert!(matches!(
            read(&schema, b"REC\x00\xFF"),
            Err(FormatError::TrailingInput { offset: 4, remaining: 1 })
        ));

        let config = CodecConfig::default().with_allow_trailing_bytes(true);
        let store = StructureReader::new(&schema, b"REC\x00\xFF", &config)
            .read()
            .expect("Test operation should succeed");
        assert_eq!(store.repeated_count(&path("group")).unwrap(), 0);
    }

    #[test]
    fn test_conditional_field() {
        let schema = schema(
            r#"{"name": "flags", "fields": [
                { "name": "hasExtra", "type": "INTEGER", "size": 1 },
                { "name": "extra", "type": "INTEGER", "size": 2, "condition": "?hasExtra?=1" },
                { "name": "end", "type": "DELIMITER", "size": 1 }
            ]}"#,
        );

        let with = read(&schema, &[1, 0x12, 0x34, 0xFF]).expect("Test operation should succeed");
        assert_eq!(with.integer(&path("extra")).unwrap(), 0x1234);

        let without = read(&schema, &[0, 0xFF]).expect("Test operation should succeed");
        assert!(!without.contains(&path("extra")));
        assert_eq!(without.bytes(&path("end")).unwrap(), &[0xFF]);
    }

    #[test]
    fn test_repeat_until_end() {
        let schema = schema(
            r#"{"name": "pairs", "littleEndian": true, "fields": [
                { "name": "pairs", "type": "REPEATER", "subFields": [
                    { "name": "key", "type": "INTEGER", "size": 2 },
                    { "name": "value", "type": "INTEGER", "size": 2, "signed": true }
                ]}
            ]}"#,
        );

        let store = read(&schema, &[1, 0, 0xFF, 0xFF, 2, 0, 3, 0]).expect("Test operation should succeed");
        assert_eq!(store.repeated_count(&path("pairs")).unwrap(), 2);
        assert_eq!(store.integer(&path("pairs[0].value")).unwrap(), -1);
        assert_eq!(store.integer(&path("pairs[1].key")).unwrap(), 2);
    }

    #[test]
    fn test_repetition_limit() {
        let schema = schema(RECORDS);
        let config = CodecConfig::default().with_max_repetitions(1);
        let result = StructureReader::new(&schema, b"REC\x02\x01A\x03BCD", &config).read();
        assert!(matches!(result, Err(FormatError::InvalidSize { size: 2, .. })));
    }

    #[test]
    fn test_links_registered_and_validated() {
        let schema = schema(
            r#"{"name": "linked", "fields": [
                { "name": "pointer", "type": "INTEGER", "size": 1, "isLinkSource": true },
                { "name": "pad", "type": "GAP", "size": 1 },
                { "name": "landing", "type": "INTEGER", "size": 1, "isLinkTarget": true }
            ]}"#,
        );

        let store = read(&schema, &[2, 0, 9]).expect("Test operation should succeed");
        assert_eq!(store.links().target_at(2), Some(&path("landing")));
        assert_eq!(store.links().source_at(2), Some(&path("pointer")));

        assert!(matches!(
            read(&schema, &[1, 0, 9]),
            Err(FormatError::LinkMismatch(_))
        ));
    }
}
