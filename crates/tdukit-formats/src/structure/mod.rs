//! Schema-driven parsing and serialization
//!
//! [`StructureReader`] walks a [`FormatSchema`](crate::schema::FormatSchema)
//! over a byte buffer and fills a [`DataStore`]. [`StructureWriter`] walks the
//! same schema over a store and produces bytes. Both resolve sizes, counts
//! and conditions against the store as they go, so editing a field that
//! others depend on resizes them on the next write.

mod reader;
mod writer;

pub use reader::StructureReader;
pub use writer::StructureWriter;

use crate::error::{FormatError, Result};
use crate::formula::{resolve_condition, resolve_to_integer};
use crate::schema::{FieldDescriptor, SizeSpec};
use crate::store::{DataStore, FieldPath};

/// Resolve a byte size or repetition count in `scope`
pub(crate) fn resolve_size(spec: &SizeSpec, scope: &FieldPath, store: &DataStore) -> Result<usize> {
    match spec {
        SizeSpec::Literal(size) => Ok(*size),
        SizeSpec::Formula(formula) => {
            let value = resolve_to_integer(formula, Some(scope), store)?;
            usize::try_from(value).map_err(|_| FormatError::InvalidSize {
                size: value,
                reason: "sizes and counts cannot be negative",
            })
        }
    }
}

/// Whether a field is present in `scope`
pub(crate) fn is_present(field: &FieldDescriptor, scope: &FieldPath, store: &DataStore) -> Result<bool> {
    match &field.condition {
        Some(condition) => resolve_condition(condition, Some(scope), store),
        None => Ok(true),
    }
}
