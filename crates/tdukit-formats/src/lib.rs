//! Structure-driven binary codec for racing game file formats
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Pointer values keep their bit pattern
#![allow(clippy::cast_precision_loss)] // Formula arithmetic runs in f64
#![allow(clippy::doc_markdown)] // Field type names are not code
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::float_cmp)] // Binary format requirements
#![allow(clippy::uninlined_format_args)] // Consistent tracing call style
#![allow(clippy::return_self_not_must_use)] // Builder patterns
//! Binary files of the game (camera sets, material banks, database tables,
//! save games) are described by JSON schemas instead of hand-written
//! parsers. This crate executes such a schema against a byte buffer and
//! produces a [`DataStore`] of decoded values, and writes a possibly edited
//! store back to bytes.
//!
//! # Components
//!
//! - **Codec**: conversions between raw bytes and typed values, including
//!   half floats and `0x[AA BB]` hex strings
//! - **Schema**: [`FormatSchema`], loaded from JSON and validated
//! - **Formulas**: sizes and counts computed from earlier fields, and
//!   single-comparison conditions gating optional fields
//! - **Store**: [`DataStore`], path-addressed entries in layout order
//! - **Links**: [`LinkRegistry`], cross-checked pointer sources and targets
//! - **Structure**: [`StructureReader`] and [`StructureWriter`]
//! - **Pipeline**: [`read_structure`] and [`write_structure`], adding the
//!   cipher stage from `tdukit-crypto`
//!
//! # Round-Trip Guarantee
//!
//! Writing an unmodified store reproduces the parsed bytes exactly. Edited
//! values are re-encoded; fields whose sizes depend on them are resized and
//! pointers to moved fields are rewritten.
//!
//! # Examples
//!
//! ```
//! use tdukit_formats::{CodecConfig, FieldPath, FormatSchema, read_structure, write_structure};
//!
//! let schema = FormatSchema::from_json_str(r#"{
//!     "name": "names",
//!     "fields": [
//!         { "name": "count", "type": "INTEGER", "size": 1 },
//!         { "name": "names", "type": "REPEATER", "size": "=?count?", "subFields": [
//!             { "name": "len", "type": "INTEGER", "size": 1 },
//!             { "name": "text", "type": "TEXT", "size": "=?len?" }
//!         ]}
//!     ]
//! }"#).expect("Schema should load");
//!
//! let config = CodecConfig::default();
//! let mut store = read_structure(&schema, b"\x01\x02AB", &config).expect("Parse should succeed");
//!
//! let text: FieldPath = "names[0].text".parse().expect("Path should parse");
//! assert_eq!(store.text(&text).expect("Field should exist"), "AB");
//!
//! store.set_integer(&"names[0].len".parse().expect("Path should parse"), 3).expect("Field should exist");
//! store.set_text(&text, "XYZ").expect("Field should exist");
//! let bytes = write_structure(&schema, &store, &config).expect("Write should succeed");
//! assert_eq!(bytes, b"\x01\x03XYZ");
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod formula;
pub mod links;
pub mod pipeline;
pub mod schema;
pub mod store;
pub mod structure;

pub use cache::SchemaCache;
pub use config::CodecConfig;
pub use error::{FormatError, Result};
pub use formula::{resolve_condition, resolve_to_integer};
pub use links::LinkRegistry;
pub use pipeline::{read_structure, verify_round_trip, write_structure};
pub use schema::{FieldDescriptor, FieldKind, FieldType, FormatSchema, SizeSpec};
pub use store::{DataStore, FieldPath, FieldValue, PathSegment, StoreEntry};
pub use structure::{StructureReader, StructureWriter};
pub use tdukit_crypto::EncryptionMode;
