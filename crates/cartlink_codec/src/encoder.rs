//! Canonical record-text encoder.

use crate::error::CodecResult;
use crate::value::{cmp_keys, Value};

/// Encode a value to canonical record-text bytes.
///
/// The output is deterministic:
/// - Record keys are emitted in sorted order (length-first, then bytewise)
/// - Integers use their shortest decimal form
/// - All lengths and counts are explicit decimal prefixes
///
/// # Errors
///
/// Encoding itself cannot fail for any [`Value`]; the `Result` return keeps
/// the signature symmetric with decoding and leaves room for future limits.
pub fn encode_record(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = RecordEncoder::with_capacity(encoded_len(value));
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Returns the exact number of bytes [`encode_record`] produces for `value`.
///
/// This is the serialized size used for storage-quota accounting, computed
/// without allocating the encoding.
pub fn encoded_len(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) => 1,
        // 'i' + digits + ';'
        Value::Integer(n) => 2 + decimal_len(*n),
        // tag + len digits + ':' + payload
        Value::Text(s) => 2 + decimal_len_usize(s.len()) + s.len(),
        Value::Bytes(b) => 2 + decimal_len_usize(b.len()) + b.len(),
        Value::List(items) => {
            let body: usize = items.iter().map(encoded_len).sum();
            2 + decimal_len_usize(items.len()) + body
        }
        Value::Record(fields) => {
            let body: usize = fields
                .iter()
                .map(|(k, v)| decimal_len_usize(k.len()) + 1 + k.len() + encoded_len(v))
                .sum();
            2 + decimal_len_usize(fields.len()) + body
        }
    }
}

fn decimal_len(n: i64) -> usize {
    // Shortest decimal form, including the sign for negatives
    let mut len = if n < 0 { 1 } else { 0 };
    let mut magnitude = n.unsigned_abs();
    loop {
        len += 1;
        magnitude /= 10;
        if magnitude == 0 {
            break;
        }
    }
    len
}

fn decimal_len_usize(n: usize) -> usize {
    let mut len = 1;
    let mut n = n / 10;
    while n > 0 {
        len += 1;
        n /= 10;
    }
    len
}

/// A canonical record-text encoder.
pub struct RecordEncoder {
    buffer: Vec<u8>,
}

impl RecordEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => {
                self.buffer.push(b'~');
                Ok(())
            }
            Value::Bool(b) => {
                self.buffer.push(if *b { b'T' } else { b'F' });
                Ok(())
            }
            Value::Integer(n) => {
                self.buffer.push(b'i');
                self.push_decimal_i64(*n);
                self.buffer.push(b';');
                Ok(())
            }
            Value::Text(s) => {
                self.push_framed(b's', s.as_bytes());
                Ok(())
            }
            Value::Bytes(b) => {
                self.push_framed(b'x', b);
                Ok(())
            }
            Value::List(items) => self.encode_list(items),
            Value::Record(fields) => self.encode_fields(fields),
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn encode_list(&mut self, items: &[Value]) -> CodecResult<()> {
        self.buffer.push(b'l');
        self.push_decimal_usize(items.len());
        self.buffer.push(b':');
        for item in items {
            self.encode(item)?;
        }
        Ok(())
    }

    fn encode_fields(&mut self, fields: &[(String, Value)]) -> CodecResult<()> {
        // Sort defensively in case the Record was built without Value::record
        let mut sorted: Vec<&(String, Value)> = fields.iter().collect();
        sorted.sort_by(|a, b| cmp_keys(&a.0, &b.0));

        self.buffer.push(b'r');
        self.push_decimal_usize(fields.len());
        self.buffer.push(b':');
        for (key, value) in sorted {
            self.push_decimal_usize(key.len());
            self.buffer.push(b':');
            self.buffer.extend_from_slice(key.as_bytes());
            self.encode(value)?;
        }
        Ok(())
    }

    fn push_framed(&mut self, tag: u8, payload: &[u8]) {
        self.buffer.push(tag);
        self.push_decimal_usize(payload.len());
        self.buffer.push(b':');
        self.buffer.extend_from_slice(payload);
    }

    fn push_decimal_i64(&mut self, n: i64) {
        let mut scratch = [0u8; 20];
        if n < 0 {
            self.buffer.push(b'-');
        }
        let digits = format_magnitude(n.unsigned_abs(), &mut scratch);
        self.buffer.extend_from_slice(digits);
    }

    fn push_decimal_usize(&mut self, n: usize) {
        let mut scratch = [0u8; 20];
        let digits = format_magnitude(n as u64, &mut scratch);
        self.buffer.extend_from_slice(digits);
    }
}

fn format_magnitude(mut n: u64, scratch: &mut [u8; 20]) -> &[u8] {
    let mut pos = scratch.len();
    loop {
        pos -= 1;
        scratch[pos] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    &scratch[pos..]
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new()
    }
}
