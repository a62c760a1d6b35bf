//! Dynamic record value type.

use std::cmp::Ordering;

/// A dynamic value in the CartLink record model.
///
/// This is the closed set of shapes that can cross the register window.
/// There are no floats: quota accounting and response hashing require
/// byte-stable encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Record of named fields (keys sorted for canonical encoding).
    Record(Vec<(String, Value)>),
}

impl Value {
    /// Create a record value with canonically sorted keys.
    ///
    /// Keys are sorted length-first, then bytewise, matching the order the
    /// encoder emits and the decoder enforces.
    pub fn record(mut fields: Vec<(String, Value)>) -> Self {
        fields.sort_by(|a, b| cmp_keys(&a.0, &b.0));
        Value::Record(fields)
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as a list, if it is one.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get this value as record fields, if it is a record.
    pub fn as_record(&self) -> Option<&[(String, Value)]> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Look up a field in this record value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// Compare two record keys for canonical ordering (length-first, bytewise).
pub(crate) fn cmp_keys(a: &str, b: &str) -> Ordering {
    match a.len().cmp(&b.len()) {
        Ordering::Equal => a.as_bytes().cmp(b.as_bytes()),
        other => other,
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keys_are_sorted() {
        let record = Value::record(vec![
            ("zz".into(), Value::Integer(1)),
            ("a".into(), Value::Integer(2)),
            ("m".into(), Value::Integer(3)),
        ]);

        if let Value::Record(fields) = record {
            assert_eq!(fields[0].0, "a");
            assert_eq!(fields[1].0, "m");
            assert_eq!(fields[2].0, "zz");
        } else {
            panic!("expected Record");
        }
    }

    #[test]
    fn key_length_ordering() {
        // Shorter keys come first, regardless of alphabet
        let record = Value::record(vec![
            ("ab".into(), Value::Integer(1)),
            ("z".into(), Value::Integer(2)),
        ]);

        if let Value::Record(fields) = record {
            assert_eq!(fields[0].0, "z");
            assert_eq!(fields[1].0, "ab");
        } else {
            panic!("expected Record");
        }
    }

    #[test]
    fn record_get() {
        let record = Value::record(vec![
            ("name".into(), Value::Text("Mario".to_string())),
            ("stars".into(), Value::Integer(120)),
        ]);

        assert_eq!(record.get("name"), Some(&Value::Text("Mario".to_string())));
        assert_eq!(record.get("stars"), Some(&Value::Integer(120)));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn value_accessors() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(true).is_null());

        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_bool(), None);

        assert_eq!(Value::Integer(42).as_integer(), Some(42));
        assert_eq!(Value::Text("42".to_string()).as_integer(), None);

        assert_eq!(Value::Text("hi".to_string()).as_text(), Some("hi"));
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1, 2][..]));
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Integer(42));
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from(42u32), Value::Integer(42));
        assert_eq!(Value::from("hi"), Value::Text("hi".to_string()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
        assert_eq!(Value::from(()), Value::Null);
    }
}
