//! Parent links.
//!
//! A record can own at most one record of another type per link name. The
//! child lives under an id derived from the parent:
//!
//! ```text
//! parent  Person:42           (collection "persons")
//! child   Settings:persons:42:settings
//! ```
//!
//! The child is loaded when it exists and built fresh otherwise, so the
//! first save creates it.

use tracing::debug;

use crate::error::{RecordError, Result};
use crate::model::Model;
use crate::naming;
use crate::record::Record;

impl Model {
    /// The record of this type linked to `parent` under `name`.
    ///
    /// Fails with `ParentModelNotSavedYet` while the parent is still new,
    /// since its id is not settled.
    pub fn for_parent(&self, parent: &Record, name: &str) -> Result<Record> {
        if parent.is_new_record() {
            return Err(RecordError::ParentModelNotSavedYet(format!(
                "A unique key is required. Either save the parent {} before accessing {}, or pass a custom key.",
                parent.model().name(),
                name
            )));
        }
        let key = link_key(parent, name);
        self.for_key(&key)
    }

    /// The record of this type stored under `id`, or a fresh one with that id.
    pub fn for_key(&self, id: &str) -> Result<Record> {
        if self.exists(id)? {
            return self.find(id);
        }
        debug!(target: "kvrecord::link", model = self.name(), id, "building linked record");
        let mut record = self.new_record();
        record.set_id(id)?;
        Ok(record)
    }
}

/// `"{parent collection}:{parent id}:{name}"`.
pub fn link_key(parent: &Record, name: &str) -> String {
    format!(
        "{}:{}:{}",
        naming::tableize(parent.model().name()),
        parent.id(),
        name
    )
}
