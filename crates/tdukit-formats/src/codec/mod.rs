//! Value codec: raw bytes to typed values and back
//!
//! All conversions here are pure. Numbers are processed big-endian; callers
//! holding little-endian data flip it with [`reverse_endianness`] first.
//!
//! Text uses ISO-8859-1, where every byte maps to the code point of the same
//! value. Characters outside that range encode as `?`.

mod field;
mod half;
mod hex_string;

pub use self::field::{decode_field, encode_field};
pub use self::half::{bytes_to_f16, f16_bits_to_f32, f16_to_bytes, f32_to_f16_bits};
pub use self::hex_string::{from_hex_string, to_hex_string};

use crate::error::{FormatError, Result};

const REPLACEMENT: u8 = b'?';

/// Decode text of exactly `length` characters
///
/// Shorter input is right-padded with NUL characters, longer input is
/// truncated.
#[must_use]
pub fn bytes_to_text(bytes: &[u8], length: usize) -> String {
    let mut text: String = bytes.iter().take(length).map(|&b| char::from(b)).collect();
    for _ in bytes.len()..length {
        text.push('\0');
    }
    text
}

/// Encode text into exactly `length` bytes, zero-padding on the right
#[must_use]
pub fn text_to_bytes(text: &str, length: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = text
        .chars()
        .take(length)
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT))
        .collect();
    bytes.resize(length, 0);
    bytes
}

/// Decode an integer of `size` bytes
///
/// The unsigned path expects the value already right-aligned into 8
/// big-endian bytes. The signed path takes exactly `size` bytes and
/// sign-extends them to 64 bits. Unsigned 64-bit values above `i64::MAX`
/// keep their bit pattern.
pub fn bytes_to_integer(bytes: &[u8], signed: bool, size: usize) -> Result<i64> {
    check_integer_size(size)?;

    if !signed {
        let lane: [u8; 8] = bytes.try_into().map_err(|_| FormatError::InvalidSize {
            size: bytes.len() as i64,
            reason: "unsigned integers are decoded from an 8-byte lane",
        })?;
        return Ok(u64::from_be_bytes(lane) as i64);
    }

    if bytes.len() != size {
        return Err(FormatError::InvalidSize {
            size: bytes.len() as i64,
            reason: "signed integer input must match the declared size",
        });
    }

    let mut lane = [0u8; 8];
    lane[8 - size..].copy_from_slice(bytes);
    let raw = i64::from_be_bytes(lane);
    let shift = (8 - size) * 8;
    Ok((raw << shift) >> shift)
}

/// Encode the low `size` bytes of an integer, big-endian
pub fn integer_to_bytes(value: i64, size: usize) -> Result<Vec<u8>> {
    check_integer_size(size)?;
    Ok(value.to_be_bytes()[8 - size..].to_vec())
}

/// Check whether a value can be stored in `size` bytes with the given signedness
#[must_use]
pub fn integer_fits(value: i64, signed: bool, size: usize) -> bool {
    if size >= 8 {
        return true;
    }
    let bits = size * 8;
    if signed {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        (min..=max).contains(&value)
    } else {
        (0..(1i64 << bits)).contains(&value)
    }
}

/// Right-align `bytes` into an 8-byte lane for the unsigned decoding path
pub fn widen_to_lane(bytes: &[u8]) -> Result<[u8; 8]> {
    if bytes.len() > 8 {
        return Err(FormatError::InvalidSize {
            size: bytes.len() as i64,
            reason: "integers are at most 8 bytes",
        });
    }
    let mut lane = [0u8; 8];
    lane[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(lane)
}

/// Decode a big-endian IEEE-754 single precision value
pub fn bytes_to_f32(bytes: &[u8]) -> Result<f32> {
    let array: [u8; 4] = bytes.try_into().map_err(|_| FormatError::InvalidSize {
        size: bytes.len() as i64,
        reason: "32-bit floats need exactly 4 bytes",
    })?;
    Ok(f32::from_be_bytes(array))
}

/// Encode a single precision value, big-endian
#[must_use]
pub fn f32_to_bytes(value: f32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Flip byte order
#[must_use]
pub fn reverse_endianness(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().rev().copied().collect()
}

fn check_integer_size(size: usize) -> Result<()> {
    match size {
        1 | 2 | 4 | 8 => Ok(()),
        _ => Err(FormatError::InvalidSize {
            size: size as i64,
            reason: "integers are 1, 2, 4 or 8 bytes",
        }),
    }
}
