//! Hex dumps in the `0x[AA BB CC]` notation used by dumps and schemas

use crate::error::{FormatError, Result};

const PREFIX: &str = "0x[";
const SUFFIX: &str = "]";

/// Format bytes as `0x[AA BB CC]`
#[must_use]
pub fn to_hex_string(bytes: &[u8]) -> String {
    let body = bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{PREFIX}{body}{SUFFIX}")
}

/// Parse the `0x[AA BB CC]` notation back into bytes
///
/// Each byte must be written as exactly two hex digits, separated by
/// whitespace. Case is ignored.
pub fn from_hex_string(input: &str) -> Result<Vec<u8>> {
    let body = input
        .trim()
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.strip_suffix(SUFFIX))
        .ok_or_else(|| FormatError::InvalidFormat(format!("not a 0x[..] hex string: {input}")))?;

    body.split_whitespace()
        .map(|token| {
            if token.len() != 2 {
                return Err(FormatError::InvalidFormat(format!(
                    "hex byte must be two digits, got '{token}'"
                )));
            }
            hex::decode(token)
                .map(|decoded| decoded[0])
                .map_err(|e| FormatError::InvalidFormat(format!("invalid hex byte '{token}': {e}")))
        })
        .collect()
}
