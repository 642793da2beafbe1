//! Pointer bookkeeping
//!
//! Fields flagged as link sources hold the byte address of another field;
//! fields flagged as link targets are where those addresses land. The
//! registry maps addresses to the paths of both kinds and checks that every
//! pointer has a landing field and vice versa.

use crate::error::{FormatError, Result};
use crate::store::FieldPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Address reserved for "no link"
pub const NULL_ADDRESS: u64 = 0;

/// Address-to-path index of pointer sources and targets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRegistry {
    sources: BTreeMap<u64, FieldPath>,
    targets: BTreeMap<u64, FieldPath>,
}

impl LinkRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pointer field holding `address`
    ///
    /// Address 0 means "no link" and is ignored.
    pub fn register_source(&mut self, path: FieldPath, address: u64) -> Result<()> {
        register(&mut self.sources, "source", path, address)
    }

    /// Register a landing field starting at `address`
    ///
    /// Address 0 is ignored.
    pub fn register_target(&mut self, path: FieldPath, address: u64) -> Result<()> {
        register(&mut self.targets, "target", path, address)
    }

    /// Check that sources and targets describe the same set of addresses
    pub fn validate(&self) -> Result<()> {
        if self.sources.len() != self.targets.len() {
            return Err(FormatError::LinkMismatch(format!(
                "{} pointer source(s) but {} target(s)",
                self.sources.len(),
                self.targets.len()
            )));
        }

        if let Some((address, path)) = self
            .targets
            .iter()
            .find(|(address, _)| !self.sources.contains_key(address))
        {
            return Err(FormatError::LinkMismatch(format!(
                "target {path} at 0x{address:08X} is not pointed to by any source"
            )));
        }

        Ok(())
    }

    /// Sources in ascending address order
    pub fn sources_sorted_by_address(&self) -> impl Iterator<Item = (u64, &FieldPath)> {
        self.sources.iter().map(|(address, path)| (*address, path))
    }

    /// Targets in ascending address order
    pub fn targets_sorted_by_address(&self) -> impl Iterator<Item = (u64, &FieldPath)> {
        self.targets.iter().map(|(address, path)| (*address, path))
    }

    /// Path of the source holding `address`
    #[must_use]
    pub fn source_at(&self, address: u64) -> Option<&FieldPath> {
        self.sources.get(&address)
    }

    /// Path of the target starting at `address`
    #[must_use]
    pub fn target_at(&self, address: u64) -> Option<&FieldPath> {
        self.targets.get(&address)
    }

    /// Number of registered sources
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Number of registered targets
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Whether nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.targets.is_empty()
    }

    /// Drop every registration
    pub fn clear(&mut self) {
        self.sources.clear();
        self.targets.clear();
    }

    /// Rewrite registered paths; `None` drops the registration
    pub(crate) fn remap_paths<F>(&mut self, mut remap: F)
    where
        F: FnMut(&FieldPath) -> Option<FieldPath>,
    {
        for map in [&mut self.sources, &mut self.targets] {
            *map = std::mem::take(map)
                .into_iter()
                .filter_map(|(address, path)| remap(&path).map(|path| (address, path)))
                .collect();
        }
    }
}

fn register(
    map: &mut BTreeMap<u64, FieldPath>,
    role: &'static str,
    path: FieldPath,
    address: u64,
) -> Result<()> {
    if address == NULL_ADDRESS {
        return Ok(());
    }
    if let Some(existing) = map.get(&address) {
        return Err(FormatError::DuplicateAddress {
            role,
            address,
            path: path.to_string(),
            existing: existing.to_string(),
        });
    }
    map.insert(address, path);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).expect("Test operation should succeed")
    }

    #[test]
    fn test_matched_links_validate() {
        let mut links = LinkRegistry::new();
        links
            .register_source(path("header.first"), 0x40)
            .expect("Test operation should succeed");
        links
            .register_target(path("records[0].name"), 0x40)
            .expect("Test operation should succeed");

        assert!(links.validate().is_ok());
        assert_eq!(links.target_at(0x40), Some(&path("records[0].name")));
        assert_eq!(links.source_at(0x40), Some(&path("header.first")));
    }

    #[test]
    fn test_source_without_target_fails() {
        let mut links = LinkRegistry::new();
        links
            .register_source(path("pointer"), 0x10)
            .expect("Test operation should succeed");

        assert!(matches!(links.validate(), Err(FormatError::LinkMismatch(_))));
    }

    #[test]
    fn test_target_without_source_fails() {
        let mut links = LinkRegistry::new();
        links
            .register_source(path("pointer"), 0x10)
            .expect("Test operation should succeed");
        links
            .register_target(path("landing"), 0x20)
            .expect("Test operation should succeed");

        assert!(matches!(links.validate(), Err(FormatError::LinkMismatch(_))));
    }

    #[test]
    fn test_null_address_ignored() {
        let mut links = LinkRegistry::new();
        links
            .register_source(path("a"), NULL_ADDRESS)
            .expect("Test operation should succeed");
        links
            .register_target(path("b"), NULL_ADDRESS)
            .expect("Test operation should succeed");

        assert!(links.is_empty());
        assert!(links.validate().is_ok());
    }

    #[test]
    fn test_duplicate_address() {
        let mut links = LinkRegistry::new();
        links
            .register_target(path("a"), 8)
            .expect("Test operation should succeed");

        let err = links.register_target(path("b"), 8).unwrap_err();
        assert!(matches!(
            err,
            FormatError::DuplicateAddress { role: "target", address: 8, .. }
        ));

        // Same address in the other role is the normal case
        assert!(links.register_source(path("c"), 8).is_ok());
    }

    #[test]
    fn test_sources_sorted() {
        let mut links = LinkRegistry::new();
        for (name, address) in [("c", 30), ("a", 10), ("b", 20)] {
            links
                .register_source(path(name), address)
                .expect("Test operation should succeed");
        }

        let order: Vec<u64> = links.sources_sorted_by_address().map(|(a, _)| a).collect();
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[test]
    fn test_remap_paths() {
        let mut links = LinkRegistry::new();
        links
            .register_source(path("list[0].ptr"), 4)
            .expect("Test operation should succeed");
        links
            .register_source(path("list[1].ptr"), 8)
            .expect("Test operation should succeed");

        links.remap_paths(|p| {
            if p.starts_with(&path("list[0]")) {
                None
            } else {
                Some(path("list[0].ptr"))
            }
        });

        assert_eq!(links.source_count(), 1);
        assert_eq!(links.source_at(8), Some(&path("list[0].ptr")));
    }
}
