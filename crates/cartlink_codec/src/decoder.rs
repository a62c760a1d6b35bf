//! Canonical record-text decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{cmp_keys, Value};
use std::cmp::Ordering;

/// Decode a value from record-text bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid canonical record text or if
/// trailing bytes follow the top-level value.
pub fn decode_record(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = RecordDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes);
    }
    Ok(value)
}

/// Maximum allowed element count for lists and records.
/// Prevents allocation-based abuse from untrusted window contents.
const MAX_CONTAINER_ELEMENTS: u64 = 65_536;

/// Maximum allowed text/byte-string length.
const MAX_BYTES_LENGTH: u64 = 64 * 1024 * 1024;

/// A canonical record-text decoder.
///
/// The decoder validates canonical form: shortest decimal prefixes, sorted
/// record keys, and no trailing input when used through [`decode_record`].
pub struct RecordDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> RecordDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        match self.read_byte()? {
            b'~' => Ok(Value::Null),
            b'T' => Ok(Value::Bool(true)),
            b'F' => Ok(Value::Bool(false)),
            b'i' => self.decode_integer(),
            b's' => self.decode_text(),
            b'x' => self.decode_bytes(),
            b'l' => self.decode_list(),
            b'r' => self.decode_fields(),
            other => Err(CodecError::invalid_structure(format!(
                "unknown value tag 0x{other:02x}"
            ))),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        if self.pos >= self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    fn peek_byte(&self) -> CodecResult<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(CodecError::UnexpectedEof)
    }

    #[inline]
    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.data.len() - self.pos {
            return Err(CodecError::UnexpectedEof);
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads an unsigned decimal in shortest form, up to the given terminator.
    ///
    /// The terminator is consumed. Leading zeros are rejected (`0` itself is
    /// the only value that may start with `0`).
    fn read_decimal(&mut self, terminator: u8, limit: u64) -> CodecResult<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        let mut digits = 0usize;

        loop {
            let byte = self.read_byte()?;
            if byte == terminator {
                break;
            }
            if !byte.is_ascii_digit() {
                return Err(CodecError::invalid_structure(format!(
                    "expected digit or 0x{terminator:02x}, got 0x{byte:02x}"
                )));
            }
            digits += 1;
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(byte - b'0')))
                .ok_or(CodecError::IntegerOverflow)?;
            if value > limit {
                return Err(CodecError::SizeLimitExceeded {
                    claimed: value,
                    max_allowed: limit,
                });
            }
        }

        if digits == 0 {
            return Err(CodecError::invalid_structure("empty decimal"));
        }
        // Non-canonical: leading zero on a multi-digit number
        if digits > 1 && self.data[start] == b'0' {
            return Err(CodecError::invalid_structure(
                "non-canonical: leading zero in decimal",
            ));
        }

        Ok(value)
    }

    fn decode_integer(&mut self) -> CodecResult<Value> {
        let negative = if self.peek_byte()? == b'-' {
            self.pos += 1;
            true
        } else {
            false
        };

        let magnitude = match self.read_decimal(b';', i64::MAX as u64 + 1) {
            Err(CodecError::SizeLimitExceeded { .. }) => return Err(CodecError::IntegerOverflow),
            other => other?,
        };

        if negative {
            if magnitude == 0 {
                return Err(CodecError::invalid_structure("non-canonical: -0"));
            }
            // i64::MIN has magnitude i64::MAX + 1
            if magnitude == i64::MAX as u64 + 1 {
                return Ok(Value::Integer(i64::MIN));
            }
            Ok(Value::Integer(-(magnitude as i64)))
        } else {
            if magnitude > i64::MAX as u64 {
                return Err(CodecError::IntegerOverflow);
            }
            Ok(Value::Integer(magnitude as i64))
        }
    }

    fn decode_text(&mut self) -> CodecResult<Value> {
        let len = self.read_decimal(b':', MAX_BYTES_LENGTH)?;
        let bytes = self.read_bytes(len as usize)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(Value::Text(text.to_string()))
    }

    fn decode_bytes(&mut self) -> CodecResult<Value> {
        let len = self.read_decimal(b':', MAX_BYTES_LENGTH)?;
        let bytes = self.read_bytes(len as usize)?;
        Ok(Value::Bytes(bytes.to_vec()))
    }

    fn decode_list(&mut self) -> CodecResult<Value> {
        let count = self.read_decimal(b':', MAX_CONTAINER_ELEMENTS)? as usize;
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.decode()?);
        }
        Ok(Value::List(items))
    }

    fn decode_fields(&mut self) -> CodecResult<Value> {
        let count = self.read_decimal(b':', MAX_CONTAINER_ELEMENTS)? as usize;
        let mut fields: Vec<(String, Value)> = Vec::with_capacity(count.min(1024));

        for _ in 0..count {
            let key_len = self.read_decimal(b':', MAX_BYTES_LENGTH)?;
            let key_bytes = self.read_bytes(key_len as usize)?;
            let key = std::str::from_utf8(key_bytes)
                .map_err(|_| CodecError::InvalidUtf8)?
                .to_string();

            // Keys must be strictly increasing in canonical order
            if let Some((prev, _)) = fields.last() {
                if cmp_keys(prev, &key) != Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: record keys not in sorted order",
                    ));
                }
            }

            let value = self.decode()?;
            fields.push((key, value));
        }

        Ok(Value::Record(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_null_and_bools() {
        assert_eq!(decode_record(b"~").unwrap(), Value::Null);
        assert_eq!(decode_record(b"T").unwrap(), Value::Bool(true));
        assert_eq!(decode_record(b"F").unwrap(), Value::Bool(false));
    }

    #[test]
    fn decode_integers() {
        assert_eq!(decode_record(b"i0;").unwrap(), Value::Integer(0));
        assert_eq!(decode_record(b"i42;").unwrap(), Value::Integer(42));
        assert_eq!(decode_record(b"i-7;").unwrap(), Value::Integer(-7));
        assert_eq!(
            decode_record(b"i9223372036854775807;").unwrap(),
            Value::Integer(i64::MAX)
        );
        assert_eq!(
            decode_record(b"i-9223372036854775808;").unwrap(),
            Value::Integer(i64::MIN)
        );
    }

    #[test]
    fn decode_text() {
        assert_eq!(decode_record(b"s0:").unwrap(), Value::Text(String::new()));
        assert_eq!(
            decode_record(b"s5:hello").unwrap(),
            Value::Text("hello".to_string())
        );
    }

    #[test]
    fn decode_bytes() {
        assert_eq!(decode_record(b"x0:").unwrap(), Value::Bytes(vec![]));
        assert_eq!(
            decode_record(&[b'x', b'3', b':', 1, 2, 3]).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn decode_list() {
        assert_eq!(decode_record(b"l0:").unwrap(), Value::List(vec![]));
        assert_eq!(
            decode_record(b"l2:i1;i2;").unwrap(),
            Value::List(vec![Value::Integer(1), Value::Integer(2)])
        );
    }

    #[test]
    fn decode_fields() {
        assert_eq!(decode_record(b"r0:").unwrap(), Value::Record(vec![]));
        assert_eq!(
            decode_record(b"r1:1:ai1;").unwrap(),
            Value::Record(vec![("a".into(), Value::Integer(1))])
        );
    }

    #[test]
    fn reject_unknown_tag() {
        assert!(matches!(
            decode_record(b"q"),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_leading_zeros() {
        assert!(matches!(
            decode_record(b"i042;"),
            Err(CodecError::InvalidStructure { .. })
        ));
        assert!(matches!(
            decode_record(b"s01:a"),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_negative_zero() {
        assert!(matches!(
            decode_record(b"i-0;"),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_integer_overflow() {
        assert!(matches!(
            decode_record(b"i9223372036854775808;"),
            Err(CodecError::IntegerOverflow)
        ));
    }

    #[test]
    fn reject_unsorted_record_keys() {
        // "b" before "a" violates canonical key order
        assert!(matches!(
            decode_record(b"r2:1:bi1;1:ai2;"),
            Err(CodecError::InvalidStructure { .. })
        ));
        // Duplicate keys are also non-canonical (not strictly increasing)
        assert!(matches!(
            decode_record(b"r2:1:ai1;1:ai2;"),
            Err(CodecError::InvalidStructure { .. })
        ));
    }

    #[test]
    fn reject_trailing_bytes() {
        assert!(matches!(
            decode_record(b"i1;i2;"),
            Err(CodecError::TrailingBytes)
        ));
    }

    #[test]
    fn reject_oversized_claims() {
        assert!(matches!(
            decode_record(b"x99999999999:"),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
        assert!(matches!(
            decode_record(b"l9999999:"),
            Err(CodecError::SizeLimitExceeded { .. })
        ));
    }

    #[test]
    fn unexpected_eof() {
        assert!(matches!(decode_record(b""), Err(CodecError::UnexpectedEof)));
        assert!(matches!(
            decode_record(b"i42"),
            Err(CodecError::UnexpectedEof)
        ));
        assert!(matches!(
            decode_record(b"s5:hi"),
            Err(CodecError::UnexpectedEof)
        ));
        assert!(matches!(
            decode_record(b"l2:i1;"),
            Err(CodecError::UnexpectedEof)
        ));
    }

    #[test]
    fn invalid_utf8_rejected() {
        assert!(matches!(
            decode_record(&[b's', b'2', b':', 0xff, 0xfe]),
            Err(CodecError::InvalidUtf8)
        ));
    }
}
