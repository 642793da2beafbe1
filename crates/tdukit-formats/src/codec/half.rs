//! IEEE-754 half precision conversions
//!
//! Half floats are decoded by hand: 1 sign bit, 5 exponent bits (bias 15) and
//! 10 mantissa bits. Encoding rounds to nearest, ties to even, and saturates
//! to infinity past the largest finite half (65504).

use crate::error::{FormatError, Result};

/// Decode two big-endian bytes as a half float
pub fn bytes_to_f16(bytes: &[u8]) -> Result<f32> {
    let array: [u8; 2] = bytes.try_into().map_err(|_| FormatError::InvalidSize {
        size: bytes.len() as i64,
        reason: "half floats need exactly 2 bytes",
    })?;
    Ok(f16_bits_to_f32(u16::from_be_bytes(array)))
}

/// Encode a value as two big-endian half float bytes
#[must_use]
pub fn f16_to_bytes(value: f32) -> Vec<u8> {
    f32_to_f16_bits(value).to_be_bytes().to_vec()
}

/// Widen half float bits to a single precision value
#[must_use]
pub fn f16_bits_to_f32(half: u16) -> f32 {
    let sign = u32::from(half & 0x8000) << 16;
    let exponent = u32::from((half >> 10) & 0x1F);
    let mantissa = u32::from(half & 0x03FF);

    let bits = match (exponent, mantissa) {
        (0, 0) => sign,
        (0, _) => {
            // Subnormal: shift the mantissa up until the implicit bit appears
            let mut exp = 127 - 15 + 1;
            let mut man = mantissa;
            while man & 0x0400 == 0 {
                man <<= 1;
                exp -= 1;
            }
            sign | (exp << 23) | ((man & 0x03FF) << 13)
        }
        (0x1F, 0) => sign | 0x7F80_0000,
        (0x1F, _) => sign | 0x7F80_0000 | (mantissa << 13),
        _ => sign | ((exponent + 127 - 15) << 23) | (mantissa << 13),
    };

    f32::from_bits(bits)
}

/// Narrow a single precision value to half float bits
#[must_use]
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xFF) as i32;
    let mantissa = bits & 0x007F_FFFF;

    if exponent == 0xFF {
        if mantissa == 0 {
            return sign | 0x7C00;
        }
        // Keep the payload's top bits, forcing a quiet NaN if they vanish
        let payload = (mantissa >> 13) as u16;
        return sign | 0x7C00 | if payload == 0 { 0x0200 } else { payload };
    }

    let unbiased = exponent - 127;

    if unbiased > 15 {
        return sign | 0x7C00;
    }

    if unbiased >= -14 {
        let mut half = (((unbiased + 15) as u32) << 10) | (mantissa >> 13);
        let dropped = mantissa & 0x1FFF;
        if dropped > 0x1000 || (dropped == 0x1000 && half & 1 == 1) {
            // A carry out of the mantissa bumps the exponent, up to infinity
            half += 1;
        }
        return sign | half as u16;
    }

    if unbiased < -25 {
        return sign;
    }

    let full = mantissa | 0x0080_0000;
    let shift = (-unbiased - 1) as u32;
    let mut half = full >> shift;
    let dropped = full & ((1 << shift) - 1);
    let halfway = 1 << (shift - 1);
    if dropped > halfway || (dropped == halfway && half & 1 == 1) {
        half += 1;
    }
    sign | half as u16
}
