//! XTEA block cipher used by the game's save and data files
//!
//! This is the textbook XTEA round function with a few fixed choices:
//! - 64-bit blocks split into two little-endian 32-bit words
//! - 128-bit keys given as four 32-bit words
//! - 32 cycles (64 Feistel rounds)
//!
//! On top of the block function, [`Chaining`] selects how consecutive blocks
//! of a buffer are linked.

use crate::error::{CryptoError, Result};

/// Block size in bytes
pub const BLOCK_SIZE: usize = 8;

const DELTA: u32 = 0x9E37_79B9;
const CYCLES: u32 = 32;

/// How consecutive blocks of a buffer are linked together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chaining {
    /// Every block is processed on its own
    Ecb,
    /// Each plaintext block is XORed with the previous ciphertext block
    Cbc {
        /// Initialization vector applied to the first block
        iv: [u8; BLOCK_SIZE],
    },
}

/// XTEA cipher bound to a key
#[derive(Debug, Clone)]
pub struct XteaCipher {
    key: [u32; 4],
}

impl XteaCipher {
    /// Create a cipher for the given 128-bit key
    #[must_use]
    pub const fn new(key: [u32; 4]) -> Self {
        Self { key }
    }

    /// Encrypt a single block in place
    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let (mut v0, mut v1) = split_block(block);
        let mut sum: u32 = 0;

        for _ in 0..CYCLES {
            v0 = v0.wrapping_add(
                (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1))
                    ^ sum.wrapping_add(self.key[(sum & 3) as usize]),
            );
            sum = sum.wrapping_add(DELTA);
            v1 = v1.wrapping_add(
                (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                    ^ sum.wrapping_add(self.key[((sum >> 11) & 3) as usize]),
            );
        }

        join_block(block, v0, v1);
    }

    /// Decrypt a single block in place
    pub fn decrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let (mut v0, mut v1) = split_block(block);
        let mut sum = DELTA.wrapping_mul(CYCLES);

        for _ in 0..CYCLES {
            v1 = v1.wrapping_sub(
                (((v0 << 4) ^ (v0 >> 5)).wrapping_add(v0))
                    ^ sum.wrapping_add(self.key[((sum >> 11) & 3) as usize]),
            );
            sum = sum.wrapping_sub(DELTA);
            v0 = v0.wrapping_sub(
                (((v1 << 4) ^ (v1 >> 5)).wrapping_add(v1))
                    ^ sum.wrapping_add(self.key[(sum & 3) as usize]),
            );
        }

        join_block(block, v0, v1);
    }

    /// Encrypt a whole buffer, which must be a multiple of [`BLOCK_SIZE`]
    pub fn encrypt(&self, data: &[u8], chaining: Chaining) -> Result<Vec<u8>> {
        check_length(data)?;
        let mut output = data.to_vec();

        match chaining {
            Chaining::Ecb => {
                for chunk in output.chunks_exact_mut(BLOCK_SIZE) {
                    self.encrypt_chunk(chunk);
                }
            }
            Chaining::Cbc { iv } => {
                let mut previous = iv;
                for chunk in output.chunks_exact_mut(BLOCK_SIZE) {
                    for (byte, prev) in chunk.iter_mut().zip(previous.iter()) {
                        *byte ^= prev;
                    }
                    self.encrypt_chunk(chunk);
                    previous.copy_from_slice(chunk);
                }
            }
        }

        Ok(output)
    }

    /// Decrypt a whole buffer, which must be a multiple of [`BLOCK_SIZE`]
    pub fn decrypt(&self, data: &[u8], chaining: Chaining) -> Result<Vec<u8>> {
        check_length(data)?;
        let mut output = data.to_vec();

        match chaining {
            Chaining::Ecb => {
                for chunk in output.chunks_exact_mut(BLOCK_SIZE) {
                    self.decrypt_chunk(chunk);
                }
            }
            Chaining::Cbc { iv } => {
                let mut previous = iv;
                for chunk in output.chunks_exact_mut(BLOCK_SIZE) {
                    let mut current = [0u8; BLOCK_SIZE];
                    current.copy_from_slice(chunk);
                    self.decrypt_chunk(chunk);
                    for (byte, prev) in chunk.iter_mut().zip(previous.iter()) {
                        *byte ^= prev;
                    }
                    previous = current;
                }
            }
        }

        Ok(output)
    }

    fn encrypt_chunk(&self, chunk: &mut [u8]) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        self.encrypt_block(&mut block);
        chunk.copy_from_slice(&block);
    }

    fn decrypt_chunk(&self, chunk: &mut [u8]) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        self.decrypt_block(&mut block);
        chunk.copy_from_slice(&block);
    }
}

fn check_length(data: &[u8]) -> Result<()> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::UnsupportedEncoding {
            length: data.len(),
            block_size: BLOCK_SIZE,
        });
    }
    Ok(())
}

fn split_block(block: &[u8; BLOCK_SIZE]) -> (u32, u32) {
    (
        u32::from_le_bytes([block[0], block[1], block[2], block[3]]),
        u32::from_le_bytes([block[4], block[5], block[6], block[7]]),
    )
}

fn join_block(block: &mut [u8; BLOCK_SIZE], v0: u32, v1: u32) {
    block[..4].copy_from_slice(&v0.to_le_bytes());
    block[4..].copy_from_slice(&v1.to_le_bytes());
}
