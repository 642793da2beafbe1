//! Caller-owned schema cache
//!
//! Batch jobs that parse many files of a few kinds load each schema once and
//! share it through this cache. The cache is a plain value: create it for a
//! batch, pass it around, drop it when the batch is done.

use crate::error::Result;
use crate::schema::FormatSchema;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Loaded schemas keyed by name
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: HashMap<String, Arc<FormatSchema>>,
    hits: u64,
    misses: u64,
}

impl SchemaCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached schema for `name`, loading it on first use
    ///
    /// A failed load leaves the cache unchanged.
    pub fn get_or_load<F>(&mut self, name: &str, loader: F) -> Result<Arc<FormatSchema>>
    where
        F: FnOnce() -> Result<FormatSchema>,
    {
        if let Some(schema) = self.schemas.get(name) {
            self.hits += 1;
            return Ok(Arc::clone(schema));
        }

        self.misses += 1;
        let schema = Arc::new(loader()?);
        debug!(
            "Loaded schema '{}' ({} descriptors)",
            name,
            schema.descriptor_count()
        );
        self.schemas.insert(name.to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// Cached schema for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<FormatSchema>> {
        self.schemas.get(name).cloned()
    }

    /// Add a schema under its own name, returning the one it replaced
    pub fn insert(&mut self, schema: FormatSchema) -> Option<Arc<FormatSchema>> {
        self.schemas
            .insert(schema.name().to_string(), Arc::new(schema))
    }

    /// Number of cached schemas
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Lookups served from the cache
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that had to load
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Drop every cached schema
    pub fn clear(&mut self) {
        self.schemas.clear();
    }
}
