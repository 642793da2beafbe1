//! Stream transforms for the game's encrypted file families
//!
//! Encrypted files are run through a whole-buffer XTEA transform before any
//! structural parsing happens, and after a structure has been serialized.
//!
//! # Components
//!
//! - **Block cipher**: [`XteaCipher`] with ECB or CBC chaining
//! - **Modes**: [`EncryptionMode`] selects the key and chaining used by each
//!   file family, with a pass-through mode for plain files
//!
//! # Examples
//!
//! ```
//! use tdukit_crypto::{decrypt, encrypt, EncryptionMode};
//!
//! let plain = [0x42u8; 16];
//! let sealed = encrypt(&plain, EncryptionMode::SaveGame).expect("Encryption should succeed");
//! let opened = decrypt(&sealed, EncryptionMode::SaveGame).expect("Decryption should succeed");
//! assert_eq!(opened, plain);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod mode;
pub mod xtea;

pub use error::{CryptoError, Result};
pub use mode::{EncryptionMode, decrypt, encrypt};
pub use xtea::{BLOCK_SIZE, Chaining, XteaCipher};
