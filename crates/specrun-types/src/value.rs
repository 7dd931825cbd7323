//! The generic value model for spec documents.
//!
//! Every document and intermediate result in specrun is expressed in this
//! union; no other dynamic type appears. Deep copies are plain `Clone` —
//! the tree is fully owned, so a clone is a structural copy.

use std::collections::HashMap;

use thiserror::Error;

/// A dynamically typed value decoded from a spec document.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    Bool(bool),
    String(String),
    /// Ordered sequence of values.
    Seq(Vec<Value>),
    /// String-keyed mapping. Insertion order is not significant.
    Map(HashMap<String, Value>),
}

impl Value {
    /// Name of the value's dynamic type, used in every violation message.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Seq(_) => "seq",
            Value::Map(_) => "map",
        }
    }

    /// Borrow as a string, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer, if this is an int.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the boolean, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as a slice of values, if this is a sequence.
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as a map, if this is a map.
    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Error converting a decoded JSON/YAML tree into the value model.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The value model only represents integers.
    #[error("unsupported number {0} (only integers are representable)")]
    UnsupportedNumber(String),
}

/// Convert a `serde_json::Value` tree into the value model.
///
/// Fails on numbers that are not representable as `i64`; everything else
/// maps one-to-one.
pub fn json_to_value(json: serde_json::Value) -> Result<Value, ConvertError> {
    match json {
        serde_json::Value::Null => Ok(Value::Nil),
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| ConvertError::UnsupportedNumber(n.to_string())),
        serde_json::Value::String(s) => Ok(Value::String(s)),
        serde_json::Value::Array(items) => Ok(Value::Seq(
            items
                .into_iter()
                .map(json_to_value)
                .collect::<Result<_, _>>()?,
        )),
        serde_json::Value::Object(entries) => {
            let mut map = HashMap::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key, json_to_value(value)?);
            }
            Ok(Value::Map(map))
        }
    }
}

/// Convert a value back into a `serde_json::Value` tree.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Nil => serde_json::Value::Null,
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Seq(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(m) => {
            let mut entries = serde_json::Map::with_capacity(m.len());
            // Sort keys so serialized output is stable.
            let mut keys: Vec<_> = m.keys().collect();
            keys.sort();
            for key in keys {
                entries.insert(key.clone(), value_to_json(&m[key]));
            }
            serde_json::Value::Object(entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names() {
        assert_eq!(Value::Nil.type_name(), "nil");
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Bool(true).type_name(), "bool");
        assert_eq!(Value::String("x".into()).type_name(), "string");
        assert_eq!(Value::Seq(vec![]).type_name(), "seq");
        assert_eq!(Value::Map(HashMap::new()).type_name(), "map");
    }

    #[test]
    fn accessors_match_variants() {
        assert_eq!(Value::String("hi".into()).as_str(), Some("hi"));
        assert_eq!(Value::Int(7).as_int(), Some(7));
        assert_eq!(Value::Bool(false).as_bool(), Some(false));
        assert_eq!(Value::Int(7).as_str(), None);
        assert!(Value::Seq(vec![Value::Int(1)]).as_seq().is_some());
        assert!(Value::Map(HashMap::new()).as_map().is_some());
    }

    #[test]
    fn json_round_trip() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, true, "x", null], "b": {"c": 2}}"#).unwrap();
        let value = json_to_value(json.clone()).unwrap();
        assert_eq!(value_to_json(&value), json);
    }

    #[test]
    fn floats_are_rejected() {
        let json: serde_json::Value = serde_json::from_str("[1.5]").unwrap();
        let err = json_to_value(json).unwrap_err();
        assert!(err.to_string().contains("1.5"));
    }

    #[test]
    fn clone_is_structural() {
        let mut inner = HashMap::new();
        inner.insert("k".to_string(), Value::Seq(vec![Value::Int(1)]));
        let original = Value::Map(inner);

        let mut copy = original.clone();
        if let Value::Map(m) = &mut copy {
            m.insert("k".to_string(), Value::Nil);
        }
        // The original is untouched by mutation of the copy.
        if let Value::Map(m) = &original {
            assert_eq!(m["k"], Value::Seq(vec![Value::Int(1)]));
        } else {
            panic!("expected map");
        }
    }
}
