//! The on-store document format.
//!
//! Each record lives under `"{TypeName}:{id}"` as one JSON object:
//!
//! ```text
//! {
//!   "attributes":          { "count": 2, ... },
//!   "previous_attributes": { "count": 1, ... },
//!   "created_at":          "2024-05-01T08:00:00.000000Z",
//!   "updated_at":          "2024-05-01T08:05:00.000000Z",
//!   "current_version":     2,
//!   "versions": {
//!     "1": { "attributes": { "count": 1 }, "updated_at": "..." },
//!     "2": { "attributes": { "count": 2 }, "updated_at": "..." }
//!   }
//! }
//! ```
//!
//! `versions` is omitted for records that never kept history. Its keys are
//! integers in memory and string-encoded in JSON (serde_json does this for
//! integer map keys in both directions).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVersion {
    pub attributes: Map<String, Value>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub previous_attributes: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub current_version: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<BTreeMap<u64, StoredVersion>>,
}

impl StoredDocument {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Store key for a record: `"{TypeName}:{id}"`.
pub fn document_key(model: &str, id: &str) -> String {
    format!("{}:{}", model, id)
}

/// Scan prefix covering every record of a type.
pub fn key_prefix(model: &str) -> String {
    format!("{}:", model)
}

/// The id part of `key` when it belongs to `model`.
///
/// `"Shop:"` is also a prefix of every `"Shop::Item:"` key, so a remainder
/// starting with `:` belongs to a namespaced type, not to `model`.
pub fn id_from_key<'k>(model: &str, key: &'k str) -> Option<&'k str> {
    key.strip_prefix(model)?
        .strip_prefix(':')
        .filter(|id| is_valid_id(id))
}

/// Ids may not start with `:`, which would collide with namespaced types.
pub fn is_valid_id(id: &str) -> bool {
    !id.starts_with(':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn version_keys_are_strings_on_the_wire() {
        let mut versions = BTreeMap::new();
        versions.insert(
            1,
            StoredVersion {
                attributes: json!({"count": 1}).as_object().unwrap().clone(),
                updated_at: ts("2024-01-01T00:00:00Z"),
            },
        );
        let doc = StoredDocument {
            attributes: json!({"count": 1}).as_object().unwrap().clone(),
            previous_attributes: Map::new(),
            created_at: ts("2024-01-01T00:00:00Z"),
            updated_at: ts("2024-01-01T00:00:00Z"),
            current_version: Some(1),
            versions: Some(versions),
        };

        let value: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert!(value["versions"]["1"].is_object());
        assert_eq!(value["current_version"], json!(1));

        let parsed = StoredDocument::from_json(&value.to_string()).unwrap();
        assert_eq!(parsed, doc);
        assert!(parsed.versions.unwrap().contains_key(&1));
    }

    #[test]
    fn unversioned_document_omits_versions() {
        let doc = StoredDocument {
            attributes: Map::new(),
            previous_attributes: Map::new(),
            created_at: ts("2024-01-01T00:00:00Z"),
            updated_at: ts("2024-01-01T00:00:00Z"),
            current_version: None,
            versions: None,
        };
        let value: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert!(value.get("versions").is_none());
        assert_eq!(value["current_version"], Value::Null);
    }

    #[test]
    fn missing_optional_fields_default() {
        let raw = r#"{"attributes":{},"created_at":"2024-01-01T00:00:00Z","updated_at":"2024-01-01T00:00:00Z"}"#;
        let doc = StoredDocument::from_json(raw).unwrap();
        assert!(doc.previous_attributes.is_empty());
        assert_eq!(doc.current_version, None);
        assert_eq!(doc.versions, None);
    }

    #[test]
    fn keys() {
        assert_eq!(document_key("Widget", "abc"), "Widget:abc");
        assert_eq!(key_prefix("Widget"), "Widget:");
        assert_eq!(id_from_key("Shop", "Shop:42"), Some("42"));
        assert_eq!(id_from_key("Shop", "Shop::Item:42"), None);
        assert_eq!(id_from_key("Shop", "Shopping:42"), None);
        assert_eq!(id_from_key("Shop::Item", "Shop::Item:42"), Some("42"));
    }
}
