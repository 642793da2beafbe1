//! Field-level dispatch over [`FieldKind`]

use super::{
    bytes_to_f16, bytes_to_f32, bytes_to_integer, bytes_to_text, f16_to_bytes, f32_to_bytes,
    integer_fits, integer_to_bytes, reverse_endianness, text_to_bytes, widen_to_lane,
};
use crate::error::{FormatError, Result};
use crate::schema::FieldKind;
use crate::store::{FieldPath, FieldValue};
use std::borrow::Cow;

/// Decode the bytes of one scalar field as found in the stream
///
/// Little-endian numbers are flipped before decoding.
pub fn decode_field(kind: &FieldKind, raw: &[u8], little_endian: bool) -> Result<FieldValue> {
    let ordered = if little_endian && kind.is_numeric() {
        Cow::Owned(reverse_endianness(raw))
    } else {
        Cow::Borrowed(raw)
    };

    match kind {
        FieldKind::Text { .. } => Ok(FieldValue::Text(bytes_to_text(raw, raw.len()))),
        FieldKind::Integer { signed: true, .. } => {
            bytes_to_integer(&ordered, true, ordered.len()).map(FieldValue::Integer)
        }
        FieldKind::Integer { signed: false, .. } => {
            bytes_to_integer(&widen_to_lane(&ordered)?, false, ordered.len())
                .map(FieldValue::Integer)
        }
        FieldKind::FloatingPoint { half: true, .. } => bytes_to_f16(&ordered).map(FieldValue::Float),
        FieldKind::FloatingPoint { half: false, .. } => {
            bytes_to_f32(&ordered).map(FieldValue::Float)
        }
        FieldKind::Delimiter { .. }
        | FieldKind::Gap { .. }
        | FieldKind::Constant { .. }
        | FieldKind::Unknown { .. } => Ok(FieldValue::Bytes(raw.to_vec())),
        FieldKind::Repeater { .. } => Err(FormatError::InvalidSchema(
            "repeaters have no bytes of their own".to_string(),
        )),
    }
}

/// Encode a value into exactly `size` stream bytes
pub fn encode_field(
    kind: &FieldKind,
    value: &FieldValue,
    size: usize,
    little_endian: bool,
    path: &FieldPath,
) -> Result<Vec<u8>> {
    let size_mismatch = |actual: usize| FormatError::SizeMismatch {
        path: path.to_string(),
        expected: size,
        actual,
    };
    let type_mismatch = |expected: &'static str| FormatError::TypeMismatch {
        path: path.to_string(),
        expected,
        actual: value.type_name(),
    };

    let encoded = match (kind, value) {
        (FieldKind::Text { .. }, FieldValue::Text(text)) => text_to_bytes(text, size),
        (FieldKind::Text { .. }, _) => return Err(type_mismatch("text")),

        (FieldKind::Integer { signed, .. }, FieldValue::Integer(number)) => {
            if !integer_fits(*number, *signed, size) {
                return Err(size_mismatch(bytes_needed(*number, *signed)));
            }
            integer_to_bytes(*number, size)?
        }
        (FieldKind::Integer { .. }, _) => return Err(type_mismatch("integer")),

        (FieldKind::FloatingPoint { half, .. }, FieldValue::Float(number)) => {
            let bytes = if *half {
                f16_to_bytes(*number)
            } else {
                f32_to_bytes(*number)
            };
            if bytes.len() != size {
                return Err(size_mismatch(bytes.len()));
            }
            bytes
        }
        (FieldKind::FloatingPoint { .. }, _) => return Err(type_mismatch("float")),

        (FieldKind::Constant { expected, .. }, _) => {
            if expected.len() != size {
                return Err(size_mismatch(expected.len()));
            }
            expected.clone()
        }

        (
            FieldKind::Delimiter { .. } | FieldKind::Gap { .. } | FieldKind::Unknown { .. },
            FieldValue::Bytes(bytes),
        ) => {
            if bytes.len() != size {
                return Err(size_mismatch(bytes.len()));
            }
            bytes.clone()
        }
        (FieldKind::Delimiter { .. } | FieldKind::Gap { .. } | FieldKind::Unknown { .. }, _) => {
            return Err(type_mismatch("bytes"));
        }

        (FieldKind::Repeater { .. }, _) => {
            return Err(FormatError::InvalidSchema(format!(
                "{path} is a repeater and has no bytes of its own"
            )));
        }
    };

    if little_endian && kind.is_numeric() {
        Ok(reverse_endianness(&encoded))
    } else {
        Ok(encoded)
    }
}

/// Smallest integer width able to hold `value`
fn bytes_needed(value: i64, signed: bool) -> usize {
    [1, 2, 4]
        .into_iter()
        .find(|&size| integer_fits(value, signed, size))
        .unwrap_or(8)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::SizeSpec;

    fn integer_kind(size: usize, signed: bool) -> FieldKind {
        FieldKind::Integer {
            size: SizeSpec::Literal(size),
            signed,
        }
    }

    fn path() -> FieldPath {
        FieldPath::field("value")
    }

    #[test]
    fn test_integers_both_byte_orders() {
        let kind = integer_kind(2, false);
        assert_eq!(
            decode_field(&kind, &[0x01, 0x02], false).unwrap(),
            FieldValue::Integer(0x0102)
        );
        assert_eq!(
            decode_field(&kind, &[0x01, 0x02], true).unwrap(),
            FieldValue::Integer(0x0201)
        );
        assert_eq!(
            encode_field(&kind, &FieldValue::Integer(0x0201), 2, true, &path()).unwrap(),
            vec![0x01, 0x02]
        );

        let signed = integer_kind(1, true);
        assert_eq!(
            decode_field(&signed, &[0xFF], false).unwrap(),
            FieldValue::Integer(-1)
        );
    }

    #[test]
    fn test_half_float_little_endian() {
        let kind = FieldKind::FloatingPoint {
            size: SizeSpec::Literal(2),
            half: true,
        };
        assert_eq!(
            decode_field(&kind, &[0x90, 0x43], true).unwrap(),
            FieldValue::Float(3.781_25)
        );
        assert_eq!(
            encode_field(&kind, &FieldValue::Float(3.781_25), 2, false, &path()).unwrap(),
            vec![0x43, 0x90]
        );
    }

    #[test]
    fn test_text_is_padded_and_not_reversed() {
        let kind = FieldKind::Text {
            size: SizeSpec::Literal(4),
        };
        assert_eq!(
            encode_field(&kind, &FieldValue::Text("AB".to_string()), 4, true, &path()).unwrap(),
            b"AB\0\0".to_vec()
        );
        assert_eq!(
            decode_field(&kind, b"ABCD", true).unwrap(),
            FieldValue::Text("ABCD".to_string())
        );
    }

    #[test]
    fn test_out_of_range_integer() {
        let err = encode_field(
            &integer_kind(1, false),
            &FieldValue::Integer(300),
            1,
            false,
            &path(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FormatError::SizeMismatch { expected: 1, actual: 2, .. }
        ));
    }

    #[test]
    fn test_mismatched_value_type() {
        let err = encode_field(
            &integer_kind(4, false),
            &FieldValue::Text("1".to_string()),
            4,
            false,
            &path(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            FormatError::TypeMismatch { expected: "integer", actual: "text", .. }
        ));
    }

    #[test]
    fn test_verbatim_bytes() {
        let gap = FieldKind::Gap {
            size: SizeSpec::Literal(2),
        };
        assert!(matches!(
            encode_field(&gap, &FieldValue::Bytes(vec![0; 3]), 2, false, &path()),
            Err(FormatError::SizeMismatch { expected: 2, actual: 3, .. })
        ));

        let constant = FieldKind::Constant {
            size: SizeSpec::Literal(2),
            expected: vec![0xCA, 0xFE],
        };
        assert_eq!(
            encode_field(&constant, &FieldValue::Bytes(Vec::new()), 2, true, &path()).unwrap(),
            vec![0xCA, 0xFE]
        );
    }
}
