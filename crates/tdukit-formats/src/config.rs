//! Codec configuration
//!
//! Options that tune how buffers are read and written without changing the
//! layout a schema describes.

use serde::{Deserialize, Serialize};
use tdukit_crypto::EncryptionMode;

/// Options for [`read_structure`](crate::read_structure) and
/// [`write_structure`](crate::write_structure)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Cipher mode overriding the schema's declared mode (None defers to the schema)
    pub encryption: Option<EncryptionMode>,
    /// Emit the original bytes of fields whose value is unchanged
    pub reuse_unchanged_raw: bool,
    /// Ignore bytes left after the last top-level field
    pub allow_trailing_bytes: bool,
    /// Validate pointer sources against targets before writing them
    pub validate_output_links: bool,
    /// Upper bound on the repetitions of any single repeater
    pub max_repetitions: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            encryption: None,
            reuse_unchanged_raw: true,
            allow_trailing_bytes: false,
            validate_output_links: true,
            max_repetitions: 1 << 20,
        }
    }
}

impl CodecConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a cipher mode regardless of the schema
    pub fn with_encryption(mut self, mode: EncryptionMode) -> Self {
        self.encryption = Some(mode);
        self
    }

    /// Set whether unchanged fields keep their original bytes
    pub fn with_reuse_unchanged_raw(mut self, reuse: bool) -> Self {
        self.reuse_unchanged_raw = reuse;
        self
    }

    /// Set whether trailing bytes are tolerated
    pub fn with_allow_trailing_bytes(mut self, allow: bool) -> Self {
        self.allow_trailing_bytes = allow;
        self
    }

    /// Set whether written pointers are validated
    pub fn with_validate_output_links(mut self, validate: bool) -> Self {
        self.validate_output_links = validate;
        self
    }

    /// Set the repetition limit
    pub fn with_max_repetitions(mut self, max_repetitions: usize) -> Self {
        self.max_repetitions = max_repetitions;
        self
    }

    /// Cipher mode to use for a schema declaring `declared`
    pub fn effective_encryption(&self, declared: EncryptionMode) -> EncryptionMode {
        self.encryption.unwrap_or(declared)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_repetitions == 0 {
            return Err("max_repetitions must be greater than 0".to_string());
        }
        Ok(())
    }
}
