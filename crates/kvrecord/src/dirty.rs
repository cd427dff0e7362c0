//! # Dirty Tracking
//!
//! A [`ChangeTracker`] keeps three generations of a record's attributes:
//!
//! ```text
//!   previous  ──save──▶  original  ──save──▶  current
//!   (before the          (as of the           (in memory,
//!    last save)           last save)           maybe edited)
//! ```
//!
//! - A field is **changed** when `current` differs from `original`.
//! - A field **was changed** (by the last save) when `original` differs
//!   from `previous`.
//! - **restore** copies `original` back into `current` (undo an unsaved edit).
//! - **rollback** copies `previous` back into `current` (undo the last save,
//!   in memory; saving again persists it).
//! - **commit** runs after a successful save and shifts every generation one
//!   step left.
//!
//! Before the second save there is no recorded `previous` mapping; fields
//! missing from it read as their schema default. That is also what a stored
//! document's empty `previous_attributes` means after the first save.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::attributes::{AttrMap, AttrValue, AttributeSchema, AttributeSet};
use crate::error::Result;

/// A pending or saved change: `(before, after)`.
pub type Change = (AttrValue, AttrValue);

#[derive(Debug, Clone)]
pub struct ChangeTracker {
    current: AttributeSet,
    original: AttrMap,
    previous: AttrMap,
    saved_once: bool,
    forced: BTreeSet<String>,
}

impl ChangeTracker {
    /// Tracker for a record that has never been saved: every field starts at
    /// its default, which is also the baseline.
    pub fn new(schema: Arc<AttributeSchema>) -> Self {
        let current = AttributeSet::new(schema);
        let original = current.snapshot();
        Self {
            current,
            original,
            previous: AttrMap::new(),
            saved_once: false,
            forced: BTreeSet::new(),
        }
    }

    /// Tracker for a record loaded from the store.
    pub fn from_stored(schema: Arc<AttributeSchema>, attributes: &AttrMap, previous: AttrMap) -> Self {
        let mut tracker = Self::new(schema);
        tracker.reset(attributes, previous);
        tracker
    }

    /// Overwrite every generation from stored state (used by reload).
    pub(crate) fn reset(&mut self, attributes: &AttrMap, previous: AttrMap) {
        self.current.replace(attributes);
        self.original = self.current.snapshot();
        self.previous = previous;
        self.saved_once = true;
        self.forced.clear();
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.current
    }

    pub fn schema(&self) -> &AttributeSchema {
        self.current.schema()
    }

    pub fn get(&self, name: &str) -> Result<&AttrValue> {
        self.current.get(name)
    }

    pub fn set(&mut self, name: &str, input: &Value) -> Result<()> {
        self.current.assign(name, input)
    }

    pub fn assign_all(&mut self, input: &Map<String, Value>) -> Result<()> {
        self.current.assign_all(input)
    }

    pub(crate) fn put(&mut self, name: &str, value: AttrValue) {
        self.current.put(name, value);
    }

    pub fn is_changed(&self, name: &str) -> Result<bool> {
        let now = self.current.get(name)?;
        Ok(self.forced.contains(name) || self.original.get(name) != Some(now))
    }

    /// Names of changed fields, in declaration order.
    pub fn changed_fields(&self) -> Vec<String> {
        self.schema()
            .names()
            .filter(|name| self.is_changed(name).unwrap_or(false))
            .map(str::to_string)
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        !self.changed_fields().is_empty()
    }

    /// Pending changes as `field -> (last saved, current)`.
    pub fn changes(&self) -> BTreeMap<String, Change> {
        self.changed_fields()
            .into_iter()
            .map(|name| {
                let before = self.original.get(&name).cloned().unwrap_or(AttrValue::Null);
                let after = self.current.values().get(&name).cloned().unwrap_or(AttrValue::Null);
                (name, (before, after))
            })
            .collect()
    }

    pub fn current_value(&self, name: &str) -> Result<AttrValue> {
        self.current.get(name).cloned()
    }

    /// Value as of the last save (`attribute_was`).
    pub fn original_value(&self, name: &str) -> Result<AttrValue> {
        self.current.schema().require(name)?;
        Ok(self.original.get(name).cloned().unwrap_or(AttrValue::Null))
    }

    /// Value before the last save. For a record that was never saved this
    /// is the baseline itself.
    pub fn previous_value(&self, name: &str) -> Result<AttrValue> {
        let spec = self.current.schema().require(name)?;
        if !self.saved_once {
            return self.original_value(name);
        }
        Ok(self
            .previous
            .get(name)
            .cloned()
            .unwrap_or_else(|| spec.default.clone()))
    }

    /// Whether the last save changed `name`.
    pub fn was_changed(&self, name: &str) -> Result<bool> {
        let before = self.previous_value(name)?;
        Ok(self.saved_once && before != self.original_value(name)?)
    }

    /// Changes committed by the last save as `field -> (before, after)`.
    pub fn saved_changes(&self) -> BTreeMap<String, Change> {
        if !self.saved_once {
            return BTreeMap::new();
        }
        self.schema()
            .names()
            .filter_map(|name| {
                let before = self.previous_value(name).ok()?;
                let after = self.original_value(name).ok()?;
                (before != after).then(|| (name.to_string(), (before, after)))
            })
            .collect()
    }

    /// Undo an unsaved edit: reset `name` to its last-saved value.
    pub fn restore(&mut self, name: &str) -> Result<()> {
        if self.is_changed(name)? {
            let was = self.original_value(name)?;
            self.current.put(name, was);
            self.forced.remove(name);
        }
        Ok(())
    }

    pub fn restore_all(&mut self) {
        for name in self.changed_fields() {
            let _ = self.restore(&name);
        }
    }

    /// Reset `name` to its value before the last save and forget the change.
    pub fn rollback(&mut self, name: &str) -> Result<()> {
        let target = self.previous_value(name)?;
        if self.current.get(name)? != &target {
            self.current.put(name, target);
            self.clear_change(name)?;
        }
        Ok(())
    }

    /// Forget a pending change: the current value becomes the baseline.
    pub fn clear_change(&mut self, name: &str) -> Result<()> {
        let now = self.current.get(name)?.clone();
        self.original.insert(name.to_string(), now);
        self.forced.remove(name);
        Ok(())
    }

    /// Force `name` to count as changed even if its value is unchanged.
    pub fn mark_changed(&mut self, name: &str) -> Result<()> {
        self.current.schema().require(name)?;
        self.forced.insert(name.to_string());
        Ok(())
    }

    /// The mapping a save writes as `previous_attributes`: the baseline being
    /// replaced, or nothing for a first save.
    pub fn pending_previous(&self) -> AttrMap {
        if self.saved_once {
            self.original.clone()
        } else {
            AttrMap::new()
        }
    }

    pub fn previous_attributes(&self) -> &AttrMap {
        &self.previous
    }

    pub fn has_saved(&self) -> bool {
        self.saved_once
    }

    /// Shift the baseline forward after a successful save.
    pub fn commit(&mut self) {
        self.previous = self.pending_previous();
        self.original = self.current.snapshot();
        self.saved_once = true;
        self.forced.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeKind, AttributeSpec};
    use crate::error::RecordError;
    use serde_json::json;

    fn tracker() -> ChangeTracker {
        let mut schema = AttributeSchema::new("Widget");
        schema.push(AttributeSpec::new("count", AttributeKind::Integer).default(0));
        schema.push(AttributeSpec::new("name", AttributeKind::String));
        ChangeTracker::new(Arc::new(schema))
    }

    #[test]
    fn fresh_tracker_is_clean() {
        let t = tracker();
        assert!(!t.is_dirty());
        assert!(t.changes().is_empty());
        assert!(t.saved_changes().is_empty());
        assert!(!t.has_saved());
    }

    #[test]
    fn assignment_marks_changed_until_commit() {
        let mut t = tracker();
        t.set("count", &json!(1)).unwrap();
        assert!(t.is_changed("count").unwrap());
        assert!(!t.is_changed("name").unwrap());
        assert_eq!(t.changed_fields(), vec!["count"]);
        assert_eq!(
            t.changes().get("count"),
            Some(&(AttrValue::Integer(0), AttrValue::Integer(1)))
        );

        t.commit();
        assert!(t.has_saved());
        assert!(!t.is_changed("count").unwrap());
        assert!(t.was_changed("count").unwrap());
    }

    #[test]
    fn assigning_same_value_is_not_a_change() {
        let mut t = tracker();
        t.set("count", &json!(0)).unwrap();
        assert!(!t.is_changed("count").unwrap());
    }

    #[test]
    fn restore_undoes_unsaved_edit() {
        let mut t = tracker();
        t.set("count", &json!(1)).unwrap();
        t.commit();
        t.set("count", &json!(5)).unwrap();

        t.restore("count").unwrap();
        assert_eq!(t.get("count").unwrap(), &AttrValue::Integer(1));
        assert!(!t.is_changed("count").unwrap());
    }

    #[test]
    fn rollback_returns_to_value_before_last_save() {
        let mut t = tracker();
        t.set("count", &json!(1)).unwrap();
        t.commit();
        t.set("count", &json!(2)).unwrap();
        t.commit();

        assert_eq!(t.previous_value("count").unwrap(), AttrValue::Integer(1));
        t.rollback("count").unwrap();
        assert_eq!(t.get("count").unwrap(), &AttrValue::Integer(1));
        assert!(!t.is_changed("count").unwrap());
    }

    #[test]
    fn first_save_compares_against_defaults() {
        let mut t = tracker();
        t.set("name", &json!("gear")).unwrap();
        t.commit();

        assert!(t.previous_attributes().is_empty());
        assert!(t.was_changed("name").unwrap());
        assert!(!t.was_changed("count").unwrap());
        assert_eq!(t.saved_changes().len(), 1);
    }

    #[test]
    fn second_commit_records_previous_mapping() {
        let mut t = tracker();
        t.set("count", &json!(1)).unwrap();
        t.commit();
        t.set("count", &json!(2)).unwrap();
        t.commit();

        assert_eq!(
            t.previous_attributes().get("count"),
            Some(&AttrValue::Integer(1))
        );
        assert_eq!(
            t.saved_changes().get("count"),
            Some(&(AttrValue::Integer(1), AttrValue::Integer(2)))
        );
    }

    #[test]
    fn mark_changed_forces_dirty() {
        let mut t = tracker();
        t.mark_changed("name").unwrap();
        assert!(t.is_changed("name").unwrap());
        t.clear_change("name").unwrap();
        assert!(!t.is_changed("name").unwrap());
    }

    #[test]
    fn unknown_field_is_invalid_attribute() {
        let mut t = tracker();
        assert!(matches!(
            t.is_changed("bogus"),
            Err(RecordError::InvalidAttribute { .. })
        ));
        assert!(t.rollback("bogus").is_err());
        assert!(t.restore("bogus").is_err());
        assert!(t.mark_changed("bogus").is_err());
    }

    #[test]
    fn from_stored_uses_previous_mapping() {
        let schema = tracker().attributes().schema().clone();
        let mut attrs = AttrMap::new();
        attrs.insert("count".into(), AttrValue::Integer(2));
        let mut previous = AttrMap::new();
        previous.insert("count".into(), AttrValue::Integer(1));

        let t = ChangeTracker::from_stored(Arc::new(schema), &attrs, previous);
        assert!(!t.is_dirty());
        assert!(t.was_changed("count").unwrap());
        assert_eq!(t.previous_value("count").unwrap(), AttrValue::Integer(1));
    }
}
