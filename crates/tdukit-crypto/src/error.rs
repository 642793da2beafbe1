//! Error types for stream cipher operations

use thiserror::Error;

/// Errors that can occur while encrypting or decrypting a buffer
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Buffer cannot be processed by the selected cipher
    #[error("Unsupported encoding: {length} bytes is not a multiple of the {block_size}-byte block size")]
    UnsupportedEncoding {
        /// Length of the rejected buffer
        length: usize,
        /// Cipher block size in bytes
        block_size: usize,
    },

    /// Encryption mode name is not recognized
    #[error("Unknown encryption mode: {0}")]
    UnknownMode(String),
}

/// Result type alias for cipher operations
pub type Result<T> = std::result::Result<T, CryptoError>;
