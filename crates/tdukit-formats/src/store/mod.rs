//! Data store: parsed field values addressed by typed paths
//!
//! Every parsed field ends up as a [`StoreEntry`] holding the bytes found in
//! the stream next to their decoded [`FieldValue`]. Entries are addressed by
//! [`FieldPath`]s such as `entryList[2].speed` and kept in layout order, so a
//! store can be edited in place and written back.

mod data;
mod entry;
mod path;

pub use data::DataStore;
pub use entry::{FieldValue, StoreEntry};
pub use path::{FieldPath, PathSegment};
