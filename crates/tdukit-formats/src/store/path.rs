use crate::error::{FormatError, Result};
use std::fmt;
use std::str::FromStr;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathSegment {
    /// Named field
    Field(String),
    /// Zero-based repetition of the preceding repeater
    Index(usize),
}

/// Location of a value in a [`DataStore`](crate::store::DataStore)
///
/// Displayed and parsed in dotted form, e.g. `entryList[2].speed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Empty path, the scope of top-level fields
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Path made of a single top-level field
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![PathSegment::Field(name.into())],
        }
    }

    /// Path to a named child of this path
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Field(name.into()));
        Self { segments }
    }

    /// Path to one repetition of the repeater at this path
    #[must_use]
    pub fn indexed(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    /// Append a relative path
    #[must_use]
    pub fn join(&self, relative: &Self) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(relative.segments.iter().cloned());
        Self { segments }
    }

    /// Path without its last segment
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// Segments from the root down
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `prefix` is an ancestor of, or equal to, this path
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Name of the last field segment
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.segments.iter().rev().find_map(|segment| match segment {
            PathSegment::Field(name) => Some(name.as_str()),
            PathSegment::Index(_) => None,
        })
    }

    /// Repetition index directly below `repeater`, if this path lies inside it
    #[must_use]
    pub fn index_below(&self, repeater: &Self) -> Option<usize> {
        if !self.starts_with(repeater) {
            return None;
        }
        match self.segments.get(repeater.len()) {
            Some(PathSegment::Index(index)) => Some(*index),
            _ => None,
        }
    }

    /// Copy of this path with the segment at `position` replaced by `index`
    #[must_use]
    pub fn with_index_at(&self, position: usize, index: usize) -> Self {
        let mut segments = self.segments.clone();
        if let Some(segment) = segments.get_mut(position) {
            *segment = PathSegment::Index(index);
        }
        Self { segments }
    }

    /// Enclosing repetition scopes, innermost first, ending with the root
    ///
    /// For `a[1].b[2]` this yields `a[1].b[2]`, `a[1]` and the root.
    pub fn scopes(&self) -> impl Iterator<Item = Self> + '_ {
        self.segments
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, segment)| matches!(segment, PathSegment::Index(_)))
            .map(|(position, _)| Self {
                segments: self.segments[..=position].to_vec(),
            })
            .chain(std::iter::once(Self::root()))
    }

    /// Parse the dotted form
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || FormatError::InvalidFormat(format!("invalid field path '{text}'"));
        let mut segments = Vec::new();
        let mut rest = text;

        if rest.is_empty() {
            return Ok(Self::root());
        }

        loop {
            let end = rest.find(['.', '[']).unwrap_or(rest.len());
            let name = &rest[..end];
            if name.is_empty() || name.contains([']', '?']) {
                return Err(invalid());
            }
            segments.push(PathSegment::Field(name.to_string()));
            rest = &rest[end..];

            while let Some(after) = rest.strip_prefix('[') {
                let close = after.find(']').ok_or_else(invalid)?;
                let index = after[..close].parse::<usize>().map_err(|_| invalid())?;
                segments.push(PathSegment::Index(index));
                rest = &after[close + 1..];
            }

            if rest.is_empty() {
                break;
            }
            rest = rest.strip_prefix('.').ok_or_else(invalid)?;
        }

        Ok(Self { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if position == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_display() {
        let path = FieldPath::field("entryList").indexed(2).child("speed");
        assert_eq!(path.to_string(), "entryList[2].speed");
        assert_eq!(path.len(), 3);
        assert_eq!(path.last_name(), Some("speed"));
        assert_eq!(FieldPath::root().to_string(), "");
    }

    #[test]
    fn test_parse() {
        let path = FieldPath::parse("a[1].b[20][3].c").expect("Test operation should succeed");
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Field("a".to_string()),
                PathSegment::Index(1),
                PathSegment::Field("b".to_string()),
                PathSegment::Index(20),
                PathSegment::Index(3),
                PathSegment::Field("c".to_string()),
            ]
        );
        assert_eq!(path.to_string(), "a[1].b[20][3].c");
        assert!(FieldPath::parse("").expect("Test operation should succeed").is_root());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in ["a..b", ".a", "a.", "a[", "a[x]", "a[1]b", "[1]", "a]", "a[-1]", "?a?"] {
            assert!(
                matches!(FieldPath::parse(text), Err(FormatError::InvalidFormat(_))),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_relationships() {
        let repeater = FieldPath::field("group");
        let inner = repeater.indexed(4).child("value");

        assert!(inner.starts_with(&repeater));
        assert!(!repeater.starts_with(&inner));
        assert_eq!(inner.index_below(&repeater), Some(4));
        assert_eq!(repeater.index_below(&repeater), None);
        assert_eq!(inner.parent(), Some(repeater.indexed(4)));
        assert_eq!(FieldPath::root().parent(), None);
        assert_eq!(
            inner.with_index_at(1, 3).to_string(),
            "group[3].value"
        );
        assert_eq!(
            repeater.join(&FieldPath::field("x")).to_string(),
            "group.x"
        );
    }

    #[test]
    fn test_scopes() {
        let scope = FieldPath::parse("a[1].b[2]").expect("Test operation should succeed");
        let scopes: Vec<String> = scope.scopes().map(|s| s.to_string()).collect();
        assert_eq!(scopes, vec!["a[1].b[2]", "a[1]", ""]);

        let root_scopes: Vec<FieldPath> = FieldPath::root().scopes().collect();
        assert_eq!(root_scopes, vec![FieldPath::root()]);
    }

    #[test]
    fn test_serde_as_string() {
        let path = FieldPath::parse("x[0].y").expect("Test operation should succeed");
        let json = serde_json::to_string(&path).expect("Test operation should succeed");
        assert_eq!(json, "\"x[0].y\"");
        let back: FieldPath = serde_json::from_str(&json).expect("Test operation should succeed");
        assert_eq!(back, path);
    }
}
