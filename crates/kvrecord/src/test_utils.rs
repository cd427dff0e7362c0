//! Shared model fixtures for tests.

use std::sync::Arc;

use crate::attributes::{AttributeKind, AttributeSpec};
use crate::model::Model;
use crate::store::{KvBackend, MemBackend};

/// `Widget { count: Integer = 0, name: String, active: Boolean }` on `backend`.
pub fn widgets_on(backend: Arc<dyn KvBackend>) -> Model {
    Model::builder("Widget")
        .attribute_spec(AttributeSpec::new("count", AttributeKind::Integer).default(0))
        .attribute("name", AttributeKind::String)
        .attribute("active", AttributeKind::Boolean)
        .build(backend)
        .expect("widget model declares no reserved names")
}

/// `Widget` on a fresh in-memory backend.
pub fn widgets() -> Model {
    widgets_on(Arc::new(MemBackend::new()))
}

/// Versioned `Widget` on a fresh in-memory backend.
pub fn versioned_widgets() -> Model {
    Model::builder("Widget")
        .attribute_spec(AttributeSpec::new("count", AttributeKind::Integer).default(0))
        .attribute("name", AttributeKind::String)
        .versioned()
        .build(Arc::new(MemBackend::new()))
        .expect("widget model declares no reserved names")
}

/// `Widget` with a read-only `sku`.
pub fn skus() -> Model {
    Model::builder("Widget")
        .attribute_spec(AttributeSpec::new("sku", AttributeKind::String).readonly())
        .attribute_spec(AttributeSpec::new("count", AttributeKind::Integer).default(0))
        .build(Arc::new(MemBackend::new()))
        .expect("widget model declares no reserved names")
}
