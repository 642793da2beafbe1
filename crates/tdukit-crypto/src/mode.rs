//! Encryption modes for the two encrypted file families
//!
//! Save games and the remaining encrypted data files (database banks, special
//! resources) use the same XTEA core with different keys and block chaining.
//! [`EncryptionMode::None`] passes buffers through untouched so that callers
//! can run every file through the same pipeline.

use crate::error::{CryptoError, Result};
use crate::xtea::{BLOCK_SIZE, Chaining, XteaCipher};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Placeholder key for [`EncryptionMode::SaveGame`]
///
/// Not the game's key, so real save games will not decrypt with it. Files
/// from the game need an [`XteaCipher`] built from the real key.
pub const SAVEGAME_KEY: [u32; 4] = [0x6FE8_4A19, 0x34C1_1D7E, 0xA39D_0B52, 0x5E7B_28C6];

/// Placeholder key for [`EncryptionMode::OtherAndSpecial`], not the game's key
pub const OTHER_KEY: [u32; 4] = [0x1BD5_A276, 0x9E04_6C3F, 0x4F7A_E18D, 0xC230_95B1];

/// Placeholder initialization vector for the chained mode, not the game's IV
pub const OTHER_IV: [u8; BLOCK_SIZE] = [0x7A, 0x11, 0xC4, 0x5D, 0x08, 0xE2, 0x93, 0x36];

/// Whole-buffer transform applied outside the structural layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// Pass-through
    #[default]
    None,
    /// Save game files: ECB with the save game key
    #[serde(rename = "savegame")]
    SaveGame,
    /// Database banks and special files: chained blocks with the data key
    #[serde(rename = "other")]
    OtherAndSpecial,
}

impl EncryptionMode {
    /// Cipher and chaining for this mode, or `None` for the pass-through mode
    #[must_use]
    pub fn cipher(self) -> Option<(XteaCipher, Chaining)> {
        match self {
            Self::None => None,
            Self::SaveGame => Some((XteaCipher::new(SAVEGAME_KEY), Chaining::Ecb)),
            Self::OtherAndSpecial => Some((
                XteaCipher::new(OTHER_KEY),
                Chaining::Cbc { iv: OTHER_IV },
            )),
        }
    }

    /// Name used in schema documents and configuration
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::SaveGame => "savegame",
            Self::OtherAndSpecial => "other",
        }
    }
}

impl fmt::Display for EncryptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionMode {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "savegame" => Ok(Self::SaveGame),
            "other" | "otherandspecial" => Ok(Self::OtherAndSpecial),
            _ => Err(CryptoError::UnknownMode(s.to_string())),
        }
    }
}

/// Decrypt a buffer with the given mode
pub fn decrypt(data: &[u8], mode: EncryptionMode) -> Result<Vec<u8>> {
    match mode.cipher() {
        None => Ok(data.to_vec()),
        Some((cipher, chaining)) => {
            trace!(mode = %mode, len = data.len(), "decrypting buffer");
            cipher.decrypt(data, chaining)
        }
    }
}

/// Encrypt a buffer with the given mode
pub fn encrypt(data: &[u8], mode: EncryptionMode) -> Result<Vec<u8>> {
    match mode.cipher() {
        None => Ok(data.to_vec()),
        Some((cipher, chaining)) => {
            trace!(mode = %mode, len = data.len(), "encrypting buffer");
            cipher.encrypt(data, chaining)
        }
    }
}
