//! Attribute value types.
//!
//! This module defines the runtime representation of attribute values and
//! their conversions to and from the JSON stored in documents.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Runtime representation of an attribute value.
///
/// Every declared attribute holds one of these. Values are produced by
/// casting input through the attribute's [`AttributeKind`](super::AttributeKind),
/// so an `Integer` attribute only ever holds `Integer` or `Null`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    /// Free-form JSON (objects, arrays) for `Json` attributes.
    Json(Value),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Check if this value represents a "truthy" state.
    ///
    /// - Null: false
    /// - Bool: the boolean value itself
    /// - Integer/Float: non-zero
    /// - String: non-empty
    /// - DateTime/Json: always true (Json `null` excepted)
    pub fn is_truthy(&self) -> bool {
        match self {
            AttrValue::Null => false,
            AttrValue::Bool(v) => *v,
            AttrValue::Integer(v) => *v != 0,
            AttrValue::Float(v) => *v != 0.0,
            AttrValue::String(v) => !v.is_empty(),
            AttrValue::DateTime(_) => true,
            AttrValue::Json(v) => !v.is_null(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the numeric value as a float (integers widen).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            AttrValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            AttrValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Encode for storage in a document.
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::Bool(v) => Value::Bool(*v),
            AttrValue::Integer(v) => Value::from(*v),
            AttrValue::Float(v) => Value::from(*v),
            AttrValue::String(s) => Value::String(s.clone()),
            AttrValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            AttrValue::Json(v) => v.clone(),
        }
    }

    /// String form used by finder equality matching.
    ///
    /// `Null` renders as the empty string, dates as RFC 3339 and JSON
    /// as its compact encoding.
    pub fn to_match_string(&self) -> String {
        match self {
            AttrValue::Null => String::new(),
            AttrValue::Bool(v) => v.to_string(),
            AttrValue::Integer(v) => v.to_string(),
            AttrValue::Float(v) => v.to_string(),
            AttrValue::String(s) => s.clone(),
            AttrValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
            AttrValue::Json(Value::String(s)) => s.clone(),
            AttrValue::Json(v) => v.to_string(),
        }
    }
}

impl From<AttrValue> for Value {
    fn from(value: AttrValue) -> Self {
        value.to_json()
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Integer(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Integer(v as i64)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Integer(v as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttrValue::DateTime(v)
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttrValue::Integer(i),
                None => AttrValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => AttrValue::String(s),
            other => AttrValue::Json(other),
        }
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(AttrValue::Null)
    }
}
