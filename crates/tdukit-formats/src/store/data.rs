use crate::error::{FormatError, Result};
use crate::links::LinkRegistry;
use crate::store::{FieldPath, FieldValue, StoreEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Parsed contents of one buffer
///
/// Entries are kept in layout order. A repeater's entry comes before the
/// entries of its repetitions, which are numbered contiguously from 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataStore {
    entries: Vec<(FieldPath, StoreEntry)>,
    index: HashMap<FieldPath, usize>,
    links: LinkRegistry,
}

#[derive(Serialize, Deserialize)]
struct StoreDocument {
    entries: Vec<EntryDocument>,
    #[serde(default)]
    links: LinkRegistry,
}

#[derive(Serialize, Deserialize)]
struct EntryDocument {
    path: FieldPath,
    #[serde(flatten)]
    entry: StoreEntry,
}

impl DataStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries and links
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.links.clear();
    }

    /// Insert an entry, replacing the value in place if the path exists
    ///
    /// New paths are appended, so callers insert in layout order.
    pub fn insert(&mut self, path: FieldPath, entry: StoreEntry) {
        if let Some(&position) = self.index.get(&path) {
            self.entries[position].1 = entry;
        } else {
            self.index.insert(path.clone(), self.entries.len());
            self.entries.push((path, entry));
        }
    }

    /// Entry at `path`
    #[must_use]
    pub fn get(&self, path: &FieldPath) -> Option<&StoreEntry> {
        self.index.get(path).map(|&position| &self.entries[position].1)
    }

    /// Mutable entry at `path`
    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut StoreEntry> {
        self.index
            .get(path)
            .map(|&position| &mut self.entries[position].1)
    }

    /// Entry at `path`, or `MissingField`
    pub fn entry(&self, path: &FieldPath) -> Result<&StoreEntry> {
        self.get(path)
            .ok_or_else(|| FormatError::MissingField(path.to_string()))
    }

    /// Whether `path` has an entry
    #[must_use]
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.index.contains_key(path)
    }

    /// Entries in layout order
    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &StoreEntry)> {
        self.entries.iter().map(|(path, entry)| (path, entry))
    }

    /// Pointer registry built while parsing
    #[must_use]
    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    /// Mutable pointer registry
    pub fn links_mut(&mut self) -> &mut LinkRegistry {
        &mut self.links
    }

    pub(crate) fn set_links(&mut self, links: LinkRegistry) {
        self.links = links;
    }

    /// Compare decoded values path by path, ignoring raw bytes and links
    #[must_use]
    pub fn same_values(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((a_path, a), (b_path, b))| a_path == b_path && a.value() == b.value())
    }

    /// Integer value at `path`
    pub fn integer(&self, path: &FieldPath) -> Result<i64> {
        match self.entry(path)?.value() {
            FieldValue::Integer(value) => Ok(*value),
            other => Err(type_mismatch(path, "integer", other)),
        }
    }

    /// Float value at `path`
    pub fn float(&self, path: &FieldPath) -> Result<f32> {
        match self.entry(path)?.value() {
            FieldValue::Float(value) => Ok(*value),
            other => Err(type_mismatch(path, "float", other)),
        }
    }

    /// Text at `path` without its NUL padding
    pub fn text(&self, path: &FieldPath) -> Result<&str> {
        match self.entry(path)?.value() {
            FieldValue::Text(text) => Ok(text.trim_end_matches('\0')),
            other => Err(type_mismatch(path, "text", other)),
        }
    }

    /// Verbatim bytes at `path`
    pub fn bytes(&self, path: &FieldPath) -> Result<&[u8]> {
        match self.entry(path)?.value() {
            FieldValue::Bytes(bytes) => Ok(bytes),
            other => Err(type_mismatch(path, "bytes", other)),
        }
    }

    /// Number of repetitions of the repeater at `path`
    pub fn repeated_count(&self, path: &FieldPath) -> Result<usize> {
        match self.entry(path)?.value() {
            FieldValue::Repeated(count) => Ok(*count),
            other => Err(type_mismatch(path, "repeater", other)),
        }
    }

    /// Replace an integer value
    pub fn set_integer(&mut self, path: &FieldPath, value: i64) -> Result<()> {
        self.replace(path, "integer", FieldValue::Integer(value))
    }

    /// Replace a float value
    pub fn set_float(&mut self, path: &FieldPath, value: f32) -> Result<()> {
        self.replace(path, "float", FieldValue::Float(value))
    }

    /// Replace a text value
    ///
    /// The writer pads or truncates it to the resolved field size.
    pub fn set_text(&mut self, path: &FieldPath, value: impl Into<String>) -> Result<()> {
        self.replace(path, "text", FieldValue::Text(value.into()))
    }

    /// Replace verbatim bytes
    pub fn set_bytes(&mut self, path: &FieldPath, value: Vec<u8>) -> Result<()> {
        self.replace(path, "bytes", FieldValue::Bytes(value))
    }

    fn replace(&mut self, path: &FieldPath, expected: &'static str, value: FieldValue) -> Result<()> {
        let entry = self
            .get_mut(path)
            .ok_or_else(|| FormatError::MissingField(path.to_string()))?;
        if entry.value().type_name() != expected {
            return Err(type_mismatch(path, expected, entry.value()));
        }
        entry.set_value(value);
        Ok(())
    }

    /// Paths of every repetition of the repeater at `repeater`
    pub fn repeated_items(&self, repeater: &FieldPath) -> Result<Vec<FieldPath>> {
        let count = self.repeated_count(repeater)?;
        Ok((0..count).map(|index| repeater.indexed(index)).collect())
    }

    /// Append a repetition built from `fields`, given relative to the item
    ///
    /// The new entries land right after the repeater's existing entries.
    /// Returns the path of the new item.
    pub fn add_repeated_item(
        &mut self,
        repeater: &FieldPath,
        fields: Vec<(FieldPath, StoreEntry)>,
    ) -> Result<FieldPath> {
        let count = self.repeated_count(repeater)?;
        if fields.iter().any(|(relative, _)| relative.is_root()) {
            return Err(FormatError::InvalidFormat(
                "repetition fields need a non-empty relative path".to_string(),
            ));
        }

        let item = repeater.indexed(count);
        let insert_at = self
            .entries
            .iter()
            .rposition(|(path, _)| path.starts_with(repeater))
            .map_or(self.entries.len(), |position| position + 1);

        let added_bytes: usize = fields.iter().map(|(_, entry)| entry.raw().len()).sum();
        let tail = self.entries.split_off(insert_at);
        self.entries.extend(
            fields
                .into_iter()
                .map(|(relative, entry)| (item.join(&relative), entry)),
        );
        self.entries.extend(tail);

        if let Some(entry) = self.get_mut(repeater) {
            let span = entry.size() + added_bytes;
            entry.set_value(FieldValue::Repeated(count + 1));
            entry.set_span(span);
        }
        self.rebuild_index();

        debug!("Added {} to {} ({} items)", item, repeater, count + 1);
        Ok(item)
    }

    /// Remove one repetition and renumber the ones after it
    ///
    /// Link registrations inside the removed item are dropped; those in later
    /// items follow the renumbering.
    pub fn remove_repeated_item(&mut self, repeater: &FieldPath, index: usize) -> Result<()> {
        let count = self.repeated_count(repeater)?;
        if index >= count {
            return Err(FormatError::MissingField(repeater.indexed(index).to_string()));
        }

        let removed = repeater.indexed(index);
        let position = repeater.len();
        let renumber = |path: &FieldPath| -> Option<FieldPath> {
            if path.starts_with(&removed) {
                return None;
            }
            match path.index_below(repeater) {
                Some(current) if current > index => {
                    Some(path.with_index_at(position, current - 1))
                }
                _ => Some(path.clone()),
            }
        };

        let mut removed_bytes = 0;
        let entries = std::mem::take(&mut self.entries);
        for (path, entry) in entries {
            match renumber(&path) {
                Some(path) => self.entries.push((path, entry)),
                None => removed_bytes += entry.raw().len(),
            }
        }
        self.links.remap_paths(renumber);
        self.rebuild_index();

        if let Some(entry) = self.get_mut(repeater) {
            let span = entry.size().saturating_sub(removed_bytes);
            entry.set_value(FieldValue::Repeated(count - 1));
            entry.set_span(span);
        }

        debug!("Removed {} ({} items left)", removed, count - 1);
        Ok(())
    }

    /// One line per entry: path, type and size, raw bytes, decoded value
    #[must_use]
    pub fn dump(&self) -> String {
        self.to_string()
    }

    /// Serialize entries and links to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        let document = StoreDocument {
            entries: self
                .entries
                .iter()
                .map(|(path, entry)| EntryDocument {
                    path: path.clone(),
                    entry: entry.clone(),
                })
                .collect(),
            links: self.links.clone(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Rebuild a store from [`DataStore::to_json`] output
    pub fn from_json(json: &str) -> Result<Self> {
        let document: StoreDocument = serde_json::from_str(json)?;
        let mut store = Self::new();
        for EntryDocument { path, entry } in document.entries {
            if store.contains(&path) {
                return Err(FormatError::InvalidFormat(format!(
                    "duplicate store path '{path}'"
                )));
            }
            store.insert(path, entry);
        }
        store.links = document.links;
        Ok(store)
    }

    fn rebuild_index(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, (path, _))| (path.clone(), position))
            .collect();
    }
}

impl fmt::Display for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (path, entry) in &self.entries {
            writeln!(
                f,
                "{path}\t{}({})\t{}\t{}",
                entry.field_type(),
                entry.size(),
                crate::codec::to_hex_string(entry.raw()),
                entry.value()
            )?;
        }
        Ok(())
    }
}

fn type_mismatch(path: &FieldPath, expected: &'static str, actual: &FieldValue) -> FormatError {
    FormatError::TypeMismatch {
        path: path.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use pretty_assertions::assert_eq;

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).expect("Test operation should succeed")
    }

    fn integer(value: i64) -> StoreEntry {
        StoreEntry::new(
            FieldType::Integer,
            false,
            u16::try_from(value).unwrap_or(0).to_be_bytes().to_vec(),
            FieldValue::Integer(value),
        )
    }

    /// `count`, then `list` with two items of `{id, ptr}`, then `tail`
    fn sample_store() -> DataStore {
        let mut store = DataStore::new();
        store.insert(path("count"), integer(2));
        store.insert(path("list"), StoreEntry::repeater(2, 8));
        store.insert(path("list[0].id"), integer(10));
        store.insert(path("list[0].ptr"), integer(0x20));
        store.insert(path("list[1].id"), integer(11));
        store.insert(path("list[1].ptr"), integer(0x30));
        store.insert(
            path("tail"),
            StoreEntry::new(
                FieldType::Text,
                false,
                b"END\0".to_vec(),
                FieldValue::Text("END\0".to_string()),
            ),
        );
        store
            .links_mut()
            .register_source(path("list[0].ptr"), 0x20)
            .expect("Test operation should succeed");
        store
            .links_mut()
            .register_source(path("list[1].ptr"), 0x30)
            .expect("Test operation should succeed");
        store
    }

    fn paths(store: &DataStore) -> Vec<String> {
        store.iter().map(|(p, _)| p.to_string()).collect()
    }

    #[test]
    fn test_typed_access() {
        let mut store = sample_store();
        assert_eq!(store.integer(&path("list[1].id")).unwrap(), 11);
        assert_eq!(store.text(&path("tail")).unwrap(), "END");
        assert_eq!(store.repeated_count(&path("list")).unwrap(), 2);

        store
            .set_integer(&path("count"), 5)
            .expect("Test operation should succeed");
        assert_eq!(store.integer(&path("count")).unwrap(), 5);

        assert!(matches!(
            store.set_text(&path("count"), "x"),
            Err(FormatError::TypeMismatch { expected: "text", actual: "integer", .. })
        ));
        assert!(matches!(
            store.integer(&path("nope")),
            Err(FormatError::MissingField(_))
        ));
        assert!(matches!(
            store.float(&path("tail")),
            Err(FormatError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut store = sample_store();
        store.insert(path("count"), integer(9));
        assert_eq!(store.len(), 7);
        assert_eq!(paths(&store)[0], "count");
        assert_eq!(store.integer(&path("count")).unwrap(), 9);
    }

    #[test]
    fn test_add_repeated_item() {
        let mut store = sample_store();
        let item = store
            .add_repeated_item(
                &path("list"),
                vec![
                    (path("id"), integer(12)),
                    (path("ptr"), integer(0)),
                ],
            )
            .expect("Test operation should succeed");

        assert_eq!(item, path("list[2]"));
        assert_eq!(store.repeated_count(&path("list")).unwrap(), 3);
        assert_eq!(store.get(&path("list")).unwrap().size(), 12);
        assert_eq!(
            paths(&store),
            vec![
                "count",
                "list",
                "list[0].id",
                "list[0].ptr",
                "list[1].id",
                "list[1].ptr",
                "list[2].id",
                "list[2].ptr",
                "tail",
            ]
        );
        assert_eq!(store.integer(&path("list[2].id")).unwrap(), 12);
    }

    #[test]
    fn test_remove_repeated_item_renumbers() {
        let mut store = sample_store();
        store
            .remove_repeated_item(&path("list"), 0)
            .expect("Test operation should succeed");

        assert_eq!(
            paths(&store),
            vec!["count", "list", "list[0].id", "list[0].ptr", "tail"]
        );
        assert_eq!(store.integer(&path("list[0].id")).unwrap(), 11);
        assert_eq!(store.repeated_count(&path("list")).unwrap(), 1);
        assert_eq!(store.get(&path("list")).unwrap().size(), 4);

        assert_eq!(store.links().source_count(), 1);
        assert_eq!(store.links().source_at(0x30), Some(&path("list[0].ptr")));

        assert!(matches!(
            store.remove_repeated_item(&path("list"), 1),
            Err(FormatError::MissingField(_))
        ));
    }

    #[test]
    fn test_dump() {
        let store = sample_store();
        let dump = store.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[0], "count\tINTEGER(2)\t0x[00 02]\t2");
        assert_eq!(lines[1], "list\tREPEATER(8)\t0x[]\t2 item(s)");
        assert_eq!(lines[6], "tail\tTEXT(4)\t0x[45 4E 44 00]\t\"END\"");
    }

    #[test]
    fn test_json_round_trip() {
        let store = sample_store();
        let json = store.to_json().expect("Test operation should succeed");
        let back = DataStore::from_json(&json).expect("Test operation should succeed");

        assert_eq!(back, store);
        assert!(back.same_values(&store));
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let json = r#"{"entries": [
            {"path": "a", "type": "GAP", "size": 1, "raw": "0x[00]", "value": {"bytes": "0x[00]"}},
            {"path": "a", "type": "GAP", "size": 1, "raw": "0x[00]", "value": {"bytes": "0x[00]"}}
        ]}"#;
        assert!(matches!(
            DataStore::from_json(json),
            Err(FormatError::InvalidFormat(_))
        ));
    }
}
