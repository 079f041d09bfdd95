//! Attribute values stored in feature columns

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    /// Numeric view; strings and booleans are not numbers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Equality that treats `Int(3)` and `Float(3.0)` as the same value
    pub fn loosely_equals(&self, other: &AttributeValue) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }

    /// Ordering used for sorting and min/max: nulls first, then numbers, then text
    pub fn total_cmp(&self, other: &AttributeValue) -> Ordering {
        fn rank(v: &AttributeValue) -> u8 {
            match v {
                AttributeValue::Null => 0,
                AttributeValue::Bool(_) => 1,
                AttributeValue::Int(_) | AttributeValue::Float(_) => 2,
                AttributeValue::String(_) => 3,
            }
        }
        match (self, other) {
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a.cmp(b),
            (AttributeValue::String(a), AttributeValue::String(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => rank(self).cmp(&rank(other)),
            },
        }
    }

    /// Parse a text cell: empty → Null, then integer, float, boolean, text
    pub fn infer(text: &str) -> AttributeValue {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == "NA" {
            return AttributeValue::Null;
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return AttributeValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return AttributeValue::Float(f);
        }
        match trimmed {
            "TRUE" | "true" => AttributeValue::Bool(true),
            "FALSE" | "false" => AttributeValue::Bool(false),
            _ => AttributeValue::String(trimmed.to_string()),
        }
    }

    /// Convert from a JSON value; arrays and objects are kept as JSON text
    pub fn from_json(value: &serde_json::Value) -> AttributeValue {
        match value {
            serde_json::Value::Null => AttributeValue::Null,
            serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Int(i),
                None => n.as_f64().map(AttributeValue::Float).unwrap_or(AttributeValue::Null),
            },
            serde_json::Value::String(s) => AttributeValue::String(s.clone()),
            other => AttributeValue::String(other.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttributeValue::Null => serde_json::Value::Null,
            AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
            AttributeValue::Int(i) => serde_json::Value::from(*i),
            AttributeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            AttributeValue::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "NA"),
            AttributeValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        AttributeValue::Float(f)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Bool(b)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttributeValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_cell_types() {
        assert_eq!(AttributeValue::infer("42"), AttributeValue::Int(42));
        assert_eq!(AttributeValue::infer(" 4.5 "), AttributeValue::Float(4.5));
        assert_eq!(AttributeValue::infer("TRUE"), AttributeValue::Bool(true));
        assert_eq!(AttributeValue::infer(""), AttributeValue::Null);
        assert_eq!(AttributeValue::infer("NA"), AttributeValue::Null);
        assert_eq!(AttributeValue::infer("Paris"), AttributeValue::from("Paris"));
    }

    #[test]
    fn numeric_equality_across_types() {
        assert!(AttributeValue::Int(3).loosely_equals(&AttributeValue::Float(3.0)));
        assert!(!AttributeValue::from("3").loosely_equals(&AttributeValue::Int(3)));
    }

    #[test]
    fn untagged_json_form() {
        let v: AttributeValue = serde_json::from_str("\"Western Europe\"").unwrap();
        assert_eq!(v, AttributeValue::from("Western Europe"));
        let n: AttributeValue = serde_json::from_str("12").unwrap();
        assert_eq!(n, AttributeValue::Int(12));
        let null: AttributeValue = serde_json::from_str("null").unwrap();
        assert!(null.is_null());
    }
}
