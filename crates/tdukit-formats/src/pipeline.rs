//! Cipher and structure stages combined
//!
//! ```text
//! read:  bytes -> decrypt -> StructureReader -> DataStore
//! write: DataStore -> StructureWriter -> encrypt -> bytes
//! ```

use crate::config::CodecConfig;
use crate::error::{FormatError, Result};
use crate::schema::FormatSchema;
use crate::store::DataStore;
use crate::structure::{StructureReader, StructureWriter};
use std::borrow::Cow;
use tdukit_crypto::EncryptionMode;
use tracing::debug;

/// Decrypt and parse a buffer
///
/// The cipher mode comes from the configuration when set, otherwise from the
/// schema.
pub fn read_structure(schema: &FormatSchema, bytes: &[u8], config: &CodecConfig) -> Result<DataStore> {
    check_config(config)?;
    let mode = config.effective_encryption(schema.encryption());

    let plain = match mode {
        EncryptionMode::None => Cow::Borrowed(bytes),
        mode => {
            debug!("Decrypting {} bytes ({})", bytes.len(), mode);
            Cow::Owned(tdukit_crypto::decrypt(bytes, mode)?)
        }
    };

    StructureReader::new(schema, &plain, config).read()
}

/// Serialize a store and encrypt the result
pub fn write_structure(schema: &FormatSchema, store: &DataStore, config: &CodecConfig) -> Result<Vec<u8>> {
    check_config(config)?;
    let mode = config.effective_encryption(schema.encryption());

    let plain = StructureWriter::new(schema, store, config).write()?;
    match mode {
        EncryptionMode::None => Ok(plain),
        mode => {
            debug!("Encrypting {} bytes ({})", plain.len(), mode);
            Ok(tdukit_crypto::encrypt(&plain, mode)?)
        }
    }
}

/// Parse a buffer, write it back and check that nothing changed
///
/// Returns the parsed store on success. Fails with `RoundTripMismatch`
/// naming the first differing offset when the output is not identical.
pub fn verify_round_trip(schema: &FormatSchema, bytes: &[u8], config: &CodecConfig) -> Result<DataStore> {
    let store = read_structure(schema, bytes, config)?;
    let written = write_structure(schema, &store, config)?;

    let offset = written
        .iter()
        .zip(bytes)
        .position(|(a, b)| a != b)
        .or_else(|| (written.len() != bytes.len()).then_some(written.len().min(bytes.len())));
    if let Some(offset) = offset {
        return Err(FormatError::RoundTripMismatch {
            schema: schema.name().to_string(),
            offset,
            expected: bytes.len(),
            actual: written.len(),
        });
    }

    debug!("Round trip of {} bytes verified", bytes.len());
    Ok(store)
}

fn check_config(config: &CodecConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| FormatError::InvalidFormat(format!("invalid codec config: {e}")))
}
