//! Schema-free representation of an inventory payload.
//!
//! Device inventories have no fixed shape, so the diff engine walks a
//! tagged-variant tree rather than a generated schema type. `BTreeMap` backs
//! `Value::Map` (rather than `HashMap`) so field-path iteration order is
//! deterministic — diff output and tests don't depend on hash ordering.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Structural equality with numeric reconciliation: an integer and a
    /// float holding the same magnitude compare equal regardless of which
    /// representation each side captured.
    pub fn values_equal(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Int(x), Value::Int(y)) => x == y,
            (Value::Float(x), Value::Float(y)) => x == y,
            (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => {
                (*x as f64) == *y
            }
            (Value::String(x), Value::String(y)) => x == y,
            (Value::List(x), Value::List(y)) => {
                x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|(a, b)| Value::values_equal(a, b))
            }
            (Value::Map(x), Value::Map(y)) => {
                x.len() == y.len()
                    && x.iter().all(|(k, v)| {
                        y.get(k).is_some_and(|other| Value::values_equal(v, other))
                    })
            }
            _ => false,
        }
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self.clone()))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn val(json: &str) -> Value {
        Value::from(serde_json::from_str::<serde_json::Value>(json).unwrap())
    }

    #[test]
    fn numeric_equality_crosses_representation() {
        assert!(Value::values_equal(&Value::Int(8), &Value::Float(8.0)));
        assert!(!Value::values_equal(&Value::Int(8), &Value::Float(8.1)));
    }

    #[test]
    fn map_equality_ignores_key_order() {
        let a = val(r#"{"os":"rhel","release":"8.0"}"#);
        let b = val(r#"{"release":"8.0","os":"rhel"}"#);
        assert!(Value::values_equal(&a, &b));
    }

    #[test]
    fn list_equality_is_position_wise() {
        let a = val(r#"[1,2,3]"#);
        let b = val(r#"[1,3,2]"#);
        assert!(!Value::values_equal(&a, &b));
    }

    #[test]
    fn json_roundtrip_preserves_structure() {
        let original: serde_json::Value =
            serde_json::from_str(r#"{"a":1,"b":[true,null,"x"],"c":{"d":2.5}}"#).unwrap();
        let value = Value::from(original.clone());
        let back: serde_json::Value = value.into();
        assert_eq!(original, back);
    }
}
