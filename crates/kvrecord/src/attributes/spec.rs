//! Attribute specifications and the per-model schema.
//!
//! This module defines the schema for attributes: what kind of value each
//! one holds, its default, and whether it may change after creation.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use super::AttrValue;
use crate::error::{RecordError, Result};

/// Field names every record carries outside of its attribute mapping.
pub const RESERVED_ATTRIBUTES: &[&str] = &["id", "created_at", "updated_at"];

/// The kind of value an attribute holds.
///
/// This determines how assigned input is cast before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Boolean,
    Integer,
    Float,
    String,
    DateTime,
    /// Any JSON value, stored as-is.
    Json,
}

impl AttributeKind {
    fn label(self) -> &'static str {
        match self {
            AttributeKind::Boolean => "boolean",
            AttributeKind::Integer => "integer",
            AttributeKind::Float => "float",
            AttributeKind::String => "string",
            AttributeKind::DateTime => "datetime",
            AttributeKind::Json => "json",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, AttributeKind::Integer | AttributeKind::Float)
    }

    /// Cast an input value to this kind.
    ///
    /// `null` always casts to [`AttrValue::Null`]. Blank strings cast to
    /// `Null` for every kind except `String` and `Json`.
    pub fn cast(self, attribute: &str, input: &Value) -> Result<AttrValue> {
        let invalid = || RecordError::InvalidValue {
            attribute: attribute.to_string(),
            expected: self.label(),
            got: input.to_string(),
        };

        if input.is_null() {
            return Ok(AttrValue::Null);
        }
        if let Value::String(s) = input {
            if s.trim().is_empty() && !matches!(self, AttributeKind::String | AttributeKind::Json) {
                return Ok(AttrValue::Null);
            }
        }

        match self {
            AttributeKind::Boolean => match input {
                Value::Bool(b) => Ok(AttrValue::Bool(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(AttrValue::Bool(false)),
                    Some(1) => Ok(AttrValue::Bool(true)),
                    _ => Err(invalid()),
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "t" | "1" | "yes" | "on" => Ok(AttrValue::Bool(true)),
                    "false" | "f" | "0" | "no" | "off" => Ok(AttrValue::Bool(false)),
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            },
            AttributeKind::Integer => match input {
                Value::Number(n) => n
                    .as_i64()
                    .or_else(|| n.as_f64().and_then(float_to_i64))
                    .map(AttrValue::Integer)
                    .ok_or_else(invalid),
                Value::Bool(b) => Ok(AttrValue::Integer(i64::from(*b))),
                Value::String(s) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .ok()
                        .or_else(|| s.parse::<f64>().ok().and_then(float_to_i64))
                        .map(AttrValue::Integer)
                        .ok_or_else(invalid)
                }
                _ => Err(invalid()),
            },
            AttributeKind::Float => match input {
                Value::Number(n) => n.as_f64().map(AttrValue::Float).ok_or_else(invalid),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(AttrValue::Float)
                    .map_err(|_| invalid()),
                _ => Err(invalid()),
            },
            AttributeKind::String => match input {
                Value::String(s) => Ok(AttrValue::String(s.clone())),
                Value::Bool(b) => Ok(AttrValue::String(b.to_string())),
                Value::Number(n) => Ok(AttrValue::String(n.to_string())),
                other => Ok(AttrValue::String(other.to_string())),
            },
            AttributeKind::DateTime => match input {
                Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| AttrValue::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|_| invalid()),
                Value::Number(n) => n
                    .as_i64()
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                    .map(AttrValue::DateTime)
                    .ok_or_else(invalid),
                _ => Err(invalid()),
            },
            AttributeKind::Json => Ok(AttrValue::Json(input.clone())),
        }
    }
}

/// Truncate `f` toward zero, or None when it does not fit an `i64`.
fn float_to_i64(f: f64) -> Option<i64> {
    let t = f.trunc();
    // i64::MAX as f64 rounds up to 2^63, which is already out of range.
    if t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64 {
        Some(t as i64)
    } else {
        None
    }
}

/// Specification for a single attribute.
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: String,
    pub kind: AttributeKind,
    /// Value a fresh record starts with.
    pub default: AttrValue,
    /// Read-only attributes may be set on creation but not changed afterwards.
    pub readonly: bool,
}

impl AttributeSpec {
    /// Create a new attribute spec with a `Null` default.
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: AttrValue::Null,
            readonly: false,
        }
    }

    /// Set the default value. The value is cast through the attribute kind.
    pub fn default(mut self, value: impl Into<AttrValue>) -> Self {
        let value = value.into();
        self.default = self
            .kind
            .cast(&self.name, &value.to_json())
            .unwrap_or(value);
        self
    }

    /// Set the readonly flag.
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }
}

/// Ordered registry of the attributes declared by one model type.
///
/// This is the single source of truth for which field names a record of
/// the type accepts.
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    model: String,
    specs: Vec<AttributeSpec>,
}

impl AttributeSchema {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            specs: Vec::new(),
        }
    }

    /// Register a spec; a later spec with the same name replaces the earlier one.
    pub(crate) fn push(&mut self, spec: AttributeSpec) {
        match self.specs.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Look up an attribute spec by name.
    pub fn get_spec(&self, name: &str) -> Option<&AttributeSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// Look up a spec, failing with `InvalidAttribute` for undeclared names.
    pub fn require(&self, name: &str) -> Result<&AttributeSpec> {
        self.get_spec(name)
            .ok_or_else(|| RecordError::invalid_attribute(&self.model, name))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.get_spec(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|spec| spec.name.as_str())
    }

    pub fn specs(&self) -> &[AttributeSpec] {
        &self.specs
    }

    pub fn readonly_attrs(&self) -> impl Iterator<Item = &str> {
        self.specs
            .iter()
            .filter(|spec| spec.readonly)
            .map(|spec| spec.name.as_str())
    }
}
