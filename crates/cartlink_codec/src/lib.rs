//! # CartLink Codec
//!
//! Canonical record-text encoding for the command traffic that crosses the
//! CartLink register window.
//!
//! Every parameter and result payload is a single [`Value`] serialized with a
//! deterministic, length-delimited textual framing:
//!
//! - Identical values always produce identical bytes
//! - Record keys are sorted (length-first, then bytewise)
//! - Integers use their shortest decimal form
//! - The decoder rejects non-canonical input and oversized claims
//!
//! Determinism matters here because the encoded length of a value is the unit
//! of storage-quota accounting.
//!
//! ## Usage
//!
//! ```
//! use cartlink_codec::{decode_record, encode_record, Value};
//!
//! let value = Value::record(vec![("stars".into(), Value::Integer(120))]);
//! let bytes = encode_record(&value).unwrap();
//! let decoded = decode_record(&bytes).unwrap();
//! assert_eq!(value, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{decode_record, RecordDecoder};
pub use encoder::{encode_record, encoded_len, RecordEncoder};
pub use error::{CodecError, CodecResult};
pub use value::Value;

/// Trait for types that can be encoded to record text.
pub trait Encode {
    /// Encode this value to canonical record-text bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from record text.
pub trait Decode: Sized {
    /// Decode this value from record-text bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        encode_record(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        decode_record(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_integer() {
        let value = Value::Integer(42);
        let bytes = encode_record(&value).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn roundtrip_negative_integer() {
        let value = Value::Integer(-100);
        let bytes = encode_record(&value).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn roundtrip_text() {
        let value = Value::Text("hello world".to_string());
        let bytes = encode_record(&value).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn roundtrip_bytes() {
        let value = Value::Bytes(vec![0, 1, 2, 0xff, b':']);
        let bytes = encode_record(&value).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn roundtrip_list() {
        let value = Value::List(vec![
            Value::Integer(1),
            Value::Text("two".to_string()),
            Value::Null,
        ]);
        let bytes = encode_record(&value).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn roundtrip_record() {
        let value = Value::record(vec![
            ("a".into(), Value::Integer(1)),
            ("b".into(), Value::Bool(true)),
        ]);
        let bytes = encode_record(&value).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn roundtrip_nested() {
        let value = Value::record(vec![
            (
                "entries".into(),
                Value::List(vec![
                    Value::record(vec![
                        ("name".into(), Value::Text("Player104".to_string())),
                        ("score".into(), Value::Integer(9500)),
                    ]),
                    Value::record(vec![
                        ("name".into(), Value::Text("Player377".to_string())),
                        ("score".into(), Value::Integer(9000)),
                    ]),
                ]),
            ),
            ("count".into(), Value::Integer(2)),
        ]);
        let bytes = encode_record(&value).unwrap();
        let decoded = decode_record(&bytes).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn encoded_len_matches_encoding() {
        let value = Value::record(vec![
            ("payload".into(), Value::Bytes(vec![7; 100])),
            ("ok".into(), Value::Bool(false)),
        ]);
        let bytes = encode_record(&value).unwrap();
        assert_eq!(encoded_len(&value), bytes.len());
    }
}
