//! The typed attribute container held by every record.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use super::{AttrValue, AttributeSchema};
use crate::error::Result;

/// Mapping from attribute name to value.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Current attribute values for one record, constrained by its schema.
///
/// Every declared attribute always has an entry (starting at its default).
/// Assignment casts input through the attribute's kind and rejects names
/// the schema does not declare.
#[derive(Debug, Clone)]
pub struct AttributeSet {
    schema: Arc<AttributeSchema>,
    values: AttrMap,
}

impl AttributeSet {
    /// A fresh set holding every attribute's default.
    pub fn new(schema: Arc<AttributeSchema>) -> Self {
        let values = defaults(&schema);
        Self { schema, values }
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Result<&AttrValue> {
        self.schema.require(name)?;
        Ok(self.values.get(name).unwrap_or(&AttrValue::Null))
    }

    /// Cast and assign a single attribute.
    pub fn assign(&mut self, name: &str, input: &Value) -> Result<()> {
        let spec = self.schema.require(name)?;
        let value = spec.kind.cast(name, input)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Cast and assign several attributes.
    ///
    /// All names and values are checked before anything is written, so a
    /// failed call leaves the set untouched.
    pub fn assign_all(&mut self, input: &Map<String, Value>) -> Result<()> {
        let mut cast = Vec::with_capacity(input.len());
        for (name, raw) in input {
            let spec = self.schema.require(name)?;
            cast.push((name.clone(), spec.kind.cast(name, raw)?));
        }
        self.values.extend(cast);
        Ok(())
    }

    pub(crate) fn put(&mut self, name: &str, value: AttrValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn values(&self) -> &AttrMap {
        &self.values
    }

    pub fn snapshot(&self) -> AttrMap {
        self.values.clone()
    }

    /// Replace all values from a snapshot, keeping only declared names.
    pub(crate) fn replace(&mut self, snapshot: &AttrMap) {
        let mut values = defaults(&self.schema);
        for (name, value) in snapshot {
            if self.schema.is_declared(name) {
                values.insert(name.clone(), value.clone());
            }
        }
        self.values = values;
    }

    pub fn to_json(&self) -> Map<String, Value> {
        map_to_json(&self.values)
    }

    pub fn defaults(&self) -> AttrMap {
        defaults(&self.schema)
    }

    /// Decode a stored attribute mapping.
    ///
    /// Stored documents may predate a schema change, so undeclared names are
    /// dropped and values that no longer cast fall back to `Null`.
    pub fn decode(schema: &AttributeSchema, stored: &Map<String, Value>) -> AttrMap {
        let mut values = AttrMap::new();
        for (name, raw) in stored {
            let Some(spec) = schema.get_spec(name) else {
                debug!(target: "kvrecord::attributes", model = schema.model(), attribute = %name, "dropping undeclared stored attribute");
                continue;
            };
            let value = spec.kind.cast(name, raw).unwrap_or_else(|err| {
                debug!(target: "kvrecord::attributes", model = schema.model(), error = %err, "stored value no longer casts");
                AttrValue::Null
            });
            values.insert(name.clone(), value);
        }
        values
    }
}

fn defaults(schema: &AttributeSchema) -> AttrMap {
    schema
        .specs()
        .iter()
        .map(|spec| (spec.name.clone(), spec.default.clone()))
        .collect()
}

pub fn map_to_json(values: &AttrMap) -> Map<String, Value> {
    values
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}
