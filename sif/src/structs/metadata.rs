//! Ordered header metadata.
//!
//! Keys keep the order in which the header decoder read them. A key that is
//! absent means the field does not exist in this file's dialect.

use std::fmt::{Display, Formatter};

/// A single decoded header value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    IntPair(i64, i64),
    FloatPair(f64, f64),
    UIntList(Vec<u64>),
    FloatList(Vec<f64>),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Lossy UTF-8 view of a byte string.
    pub fn as_text(&self) -> Option<String> {
        self.as_bytes()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "{:?}", String::from_utf8_lossy(v)),
            Value::IntPair(a, b) => write!(f, "({a}, {b})"),
            Value::FloatPair(a, b) => write!(f, "({a}, {b})"),
            Value::UIntList(v) => write!(f, "{v:?}"),
            Value::FloatList(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Bytes(v.as_bytes().to_vec())
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatList(v)
    }
}

impl From<Vec<u64>> for Value {
    fn from(v: Vec<u64>) -> Self {
        Value::UIntList(v)
    }
}

/// String-keyed map preserving header read order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, Value)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_float)
    }

    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.get(key).and_then(Value::as_bytes)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_is_kept() {
        let mut metadata = Metadata::new();
        metadata.insert("SifVersion", 65559i64);
        metadata.insert("DetectorTemperature", -60.0);
        metadata.insert("DetectorType", "DU420_BVF");

        let keys: Vec<_> = metadata.keys().collect();
        assert_eq!(keys, ["SifVersion", "DetectorTemperature", "DetectorType"]);

        metadata.insert("SifVersion", 65567i64);
        let keys: Vec<_> = metadata.keys().collect();
        assert_eq!(keys, ["SifVersion", "DetectorTemperature", "DetectorType"]);
        assert_eq!(metadata.get_int("SifVersion"), Some(65567));
    }

    #[test]
    fn test_typed_accessors() {
        let mut metadata = Metadata::new();
        metadata.insert("ExperimentTime", 1234i64);
        metadata.insert("DetectorDimensions", Value::IntPair(1024, 256));
        metadata.insert("OriginalFilename", "sample.sif");

        assert_eq!(metadata.get_float("ExperimentTime"), Some(1234.0));
        assert_eq!(metadata.get_int("DetectorDimensions"), None);
        assert_eq!(
            metadata.get("OriginalFilename").and_then(Value::as_text),
            Some("sample.sif".to_string())
        );
        assert!(!metadata.contains_key("GateWidth"));
    }
}
