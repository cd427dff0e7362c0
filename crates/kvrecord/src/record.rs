//! # Records
//!
//! A [`Record`] is one instance of a model type: its id, attribute values,
//! lifecycle state, change tracker and version ledger.
//!
//! ```text
//!        save()                 destroy() / delete()
//!  New ─────────▶ Persisted ─────────────────────────▶ Destroyed
//!   │                                                     ▲
//!   └─────────────────── destroy() / delete() ────────────┘
//! ```
//!
//! `Destroyed` is terminal: saving returns `Ok(false)` and assignments fail
//! with `ReadOnlyRecord`. The id can only change while the record is `New`.
//!
//! Records are owned by the caller. They are `Clone` but clones are
//! independent; the store is the only shared state.
//!
//! The mutating operations (`save`, `update`, `destroy`, ...) live in
//! [`crate::persistence`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::attributes::{AttrMap, AttrValue};
use crate::dirty::{Change, ChangeTracker};
use crate::error::{RecordError, Result};
use crate::model::Model;
use crate::naming;
use crate::store::is_valid_id;
use crate::validations::ValidationErrors;
use crate::versions::{Version, VersionLedger, VersioningPaused};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    New,
    Persisted,
    Destroyed,
}

#[derive(Debug, Clone)]
pub struct Record {
    model: Model,
    id: String,
    state: LifecycleState,
    previously_new_record: bool,
    tracker: ChangeTracker,
    ledger: VersionLedger,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    errors: ValidationErrors,
}

impl Record {
    pub(crate) fn assemble(
        model: Model,
        id: String,
        state: LifecycleState,
        tracker: ChangeTracker,
        ledger: VersionLedger,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            model,
            id,
            state,
            previously_new_record: false,
            tracker,
            ledger,
            created_at,
            updated_at: created_at,
            errors: ValidationErrors::new(),
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Change the id of a record that has not been saved yet.
    pub fn set_id(&mut self, id: impl Into<String>) -> Result<()> {
        if self.state != LifecycleState::New {
            return Err(RecordError::ReadOnlyRecord(
                "can't modify id when persisted".to_string(),
            ));
        }
        let id = id.into();
        if !is_valid_id(&id) {
            return Err(RecordError::invalid_id(&id));
        }
        self.id = id;
        Ok(())
    }

    /// Store key of this record: `"{TypeName}:{id}"`.
    pub fn key(&self) -> String {
        self.model.key(&self.id)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    pub fn is_new_record(&self) -> bool {
        self.state == LifecycleState::New
    }

    pub fn is_persisted(&self) -> bool {
        self.state == LifecycleState::Persisted
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == LifecycleState::Destroyed
    }

    /// True only after the save that moved this record out of `New`.
    pub fn is_previously_new_record(&self) -> bool {
        self.previously_new_record
    }

    pub(crate) fn set_previously_new_record(&mut self, value: bool) {
        self.previously_new_record = value;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub(crate) fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
    }

    pub(crate) fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    // --- attributes ---

    pub fn get(&self, name: &str) -> Result<&AttrValue> {
        self.tracker.get(name)
    }

    /// Cast and assign one attribute.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_not_destroyed()?;
        self.tracker.set(name, &value.into())
    }

    /// Cast and assign every entry of a JSON object. Nothing is assigned if
    /// any name is undeclared or any value fails to cast.
    pub fn assign(&mut self, attributes: Value) -> Result<()> {
        self.ensure_not_destroyed()?;
        let input = attribute_object(self.model.name(), attributes)?;
        self.tracker.assign_all(&input)
    }

    pub(crate) fn assign_map(&mut self, input: &Map<String, Value>) -> Result<()> {
        self.ensure_not_destroyed()?;
        self.tracker.assign_all(input)
    }

    pub fn attributes(&self) -> &AttrMap {
        self.tracker.attributes().values()
    }

    /// The attribute mapping as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.tracker.attributes().to_json())
    }

    pub(crate) fn ensure_not_destroyed(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(RecordError::ReadOnlyRecord(format!(
                "can't modify a destroyed {}",
                self.model.name()
            )));
        }
        Ok(())
    }

    pub(crate) fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    // --- dirty tracking ---

    pub fn is_changed(&self, name: &str) -> Result<bool> {
        self.tracker.is_changed(name)
    }

    pub fn changed_fields(&self) -> Vec<String> {
        self.tracker.changed_fields()
    }

    pub fn changes(&self) -> BTreeMap<String, Change> {
        self.tracker.changes()
    }

    pub fn is_dirty(&self) -> bool {
        self.tracker.is_dirty()
    }

    /// `(last saved, current)` for a changed field, `None` when unchanged.
    pub fn attribute_change(&self, name: &str) -> Result<Option<Change>> {
        if !self.tracker.is_changed(name)? {
            return Ok(None);
        }
        Ok(Some((
            self.tracker.original_value(name)?,
            self.tracker.current_value(name)?,
        )))
    }

    /// Value as of the last save.
    pub fn attribute_was(&self, name: &str) -> Result<AttrValue> {
        self.tracker.original_value(name)
    }

    /// Value before the last save.
    pub fn value_before_last_save(&self, name: &str) -> Result<AttrValue> {
        self.tracker.previous_value(name)
    }

    pub fn saved_change_to_attribute(&self, name: &str) -> Result<bool> {
        self.tracker.was_changed(name)
    }

    pub fn saved_changes(&self) -> BTreeMap<String, Change> {
        self.tracker.saved_changes()
    }

    pub fn has_saved_changes(&self) -> bool {
        !self.tracker.saved_changes().is_empty()
    }

    /// The mapping written as `previous_attributes` by the last save.
    pub fn previous_attributes(&self) -> &AttrMap {
        self.tracker.previous_attributes()
    }

    pub fn restore(&mut self, name: &str) -> Result<()> {
        self.tracker.restore(name)
    }

    pub fn restore_all(&mut self) {
        self.tracker.restore_all();
    }

    pub fn rollback(&mut self, name: &str) -> Result<()> {
        self.tracker.rollback(name)
    }

    /// Roll every attribute back to its value before the last save.
    pub fn rollback_all(&mut self) {
        let names: Vec<String> = self.model.schema().names().map(str::to_string).collect();
        for name in names {
            let _ = self.tracker.rollback(&name);
        }
    }

    pub fn clear_change(&mut self, name: &str) -> Result<()> {
        self.tracker.clear_change(name)
    }

    pub fn mark_changed(&mut self, name: &str) -> Result<()> {
        self.tracker.mark_changed(name)
    }

    // --- versions ---

    pub fn current_version(&self) -> Option<u64> {
        self.ledger.current_version()
    }

    pub fn version(&self, number: u64) -> Result<&Version> {
        self.ledger.version(number)
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.ledger.versions()
    }

    pub fn is_versioning_enabled(&self) -> bool {
        self.ledger.is_enabled()
    }

    pub fn disable_versioning(&mut self) {
        self.ledger.set_enabled(false);
    }

    pub fn enable_versioning(&mut self) {
        self.ledger.set_enabled(true);
    }

    /// Run `action` with versioning paused, restoring the previous setting
    /// afterwards even if `action` fails or panics.
    pub fn without_versioning<R>(&mut self, action: impl FnOnce(&mut Record) -> R) -> R {
        let mut paused = VersioningPaused::new(self);
        action(&mut *paused)
    }

    pub(crate) fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut VersionLedger {
        &mut self.ledger
    }

    pub(crate) fn replace_ledger(&mut self, ledger: VersionLedger) {
        self.ledger = ledger;
    }

    // --- validation ---

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Run the type's validators, replacing `errors()`.
    pub fn is_valid(&mut self) -> bool {
        let model = self.model.clone();
        let mut errors = ValidationErrors::new();
        for validator in model.validators() {
            validator(self, &mut errors);
        }
        self.errors = errors;
        self.errors.is_empty()
    }

    /// Run the validators and report whether `name` is free of errors.
    /// Afterwards `errors()` only holds messages for `name`.
    pub fn attribute_valid(&mut self, name: &str) -> Result<bool> {
        self.model.schema().require(name)?;
        self.is_valid();
        self.errors.retain_only(name);
        Ok(self.errors.is_empty())
    }

    pub(crate) fn clear_errors(&mut self) {
        self.errors.clear();
    }

    // --- presentation ---

    /// `"{collection}/new"` before the first save, `"{collection}/{id}"` after.
    pub fn cache_key(&self) -> String {
        let collection = self.model.collection_name();
        if self.is_new_record() {
            format!("{}/new", collection)
        } else {
            format!("{}/{}", collection, self.id)
        }
    }

    /// Element id: `"{type}-{id}"`, or `"new-{type}"` before the first save.
    pub fn dom_id(&self) -> String {
        let prefix = naming::dasherize(self.model.name());
        if self.is_new_record() {
            format!("new-{}", prefix)
        } else {
            format!("{}-{}", prefix, self.id)
        }
    }
}

pub(crate) fn attribute_object(model: &str, attributes: Value) -> Result<Map<String, Value>> {
    match attributes {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(RecordError::InvalidValue {
            attribute: model.to_string(),
            expected: "object",
            got: other.to_string(),
        }),
    }
}
