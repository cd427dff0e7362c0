//! Attribute filtering.
//!
//! `AttrFilter` expresses one condition on a record's attribute. Values are
//! compared by their string form, so `eq("count", 2)` and `eq("count", "2")`
//! are the same filter.

use serde_json::Value;

use super::{AttrValue, AttributeKind};
use crate::record::Record;

/// Filter operation for comparing attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact equality match.
    Eq,
    /// Not equal.
    Ne,
}

/// A filter condition on an attribute.
///
/// Combines an attribute name, an operation, and a value to match against.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrFilter {
    /// The attribute name (`"id"` is accepted alongside declared attributes)
    pub attr: String,
    pub op: FilterOp,
    /// String form of the value to compare against
    pub value: String,
}

impl AttrFilter {
    pub fn new(attr: impl Into<String>, op: FilterOp, value: impl Into<AttrValue>) -> Self {
        Self {
            attr: attr.into(),
            op,
            value: value.into().to_match_string(),
        }
    }

    /// Convenience: create an equality filter.
    pub fn eq(attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::new(attr, FilterOp::Eq, value)
    }

    /// Convenience: create a not-equal filter.
    pub fn ne(attr: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::new(attr, FilterOp::Ne, value)
    }

    /// Re-render the value the way an attribute of `kind` stores it, so
    /// `"2024-01-01T00:00:00Z"` compares equal to the stored date and `"yes"`
    /// to a stored `true`. Values that do not cast are left as given and
    /// simply match nothing.
    pub fn cast_for(mut self, kind: AttributeKind) -> Self {
        if matches!(kind, AttributeKind::String | AttributeKind::Json) {
            return self;
        }
        if let Ok(value) = kind.cast(&self.attr, &Value::String(self.value.clone())) {
            self.value = value.to_match_string();
        }
        self
    }

    /// Check if this filter matches the given record.
    ///
    /// Returns `false` if the attribute doesn't exist on the record.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = if self.attr == "id" {
            record.id().to_string()
        } else {
            match record.get(&self.attr) {
                Ok(value) => value.to_match_string(),
                Err(_) => return false,
            }
        };

        match self.op {
            FilterOp::Eq => actual == self.value,
            FilterOp::Ne => actual != self.value,
        }
    }
}
