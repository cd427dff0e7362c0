//! # Persistence
//!
//! The mutating half of [`Record`]: saving, updating, destroying and
//! reloading, plus the counter/flag helpers built on top of them.
//!
//! A save goes through these steps, inside the model's `Save` callback
//! chain (validators run before the chain):
//!
//! 1. fail with `ReadOnlyRecord` if the type is read-only, or if a read-only
//!    attribute of a persisted record is dirty
//! 2. return `Ok(false)` for a destroyed record
//! 3. stamp `updated_at`
//! 4. if versioning is on, append a snapshot (continuing the stored history
//!    for an already persisted record)
//! 5. write the document
//! 6. shift the dirty baseline and mark the record persisted
//!
//! Nothing in memory besides `updated_at` changes when the write fails.
//!
//! Non-strict operations report a stopped chain or failed validation as
//! `Ok(false)`. The `_strict` variants turn that into an error.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::attributes::{map_to_json, AttrValue, AttributeKind};
use crate::callbacks::Operation;
use crate::error::{RecordError, Result};
use crate::record::{attribute_object, LifecycleState, Record};
use crate::store::StoredDocument;
use crate::versions::VersionLedger;

impl Record {
    /// Validate and save. Returns `Ok(false)` when a validator, a hook, or
    /// the destroyed state stopped the save.
    pub fn save(&mut self) -> Result<bool> {
        if !self.is_valid() {
            debug!(target: "kvrecord::persistence", model = self.model().name(), id = self.id(), errors = ?self.errors().full_messages(), "validation failed");
            return Ok(false);
        }
        let model = self.model().clone();
        let outcome = model
            .callbacks()
            .run(Operation::Save, self, &mut |record: &mut Record| -> Result<bool> { record.create_or_update() })?;
        Ok(outcome.succeeded())
    }

    /// Like [`Record::save`] but a failed save is an error: `RecordInvalid`
    /// for validation failures, `RecordNotSaved` otherwise.
    pub fn save_strict(&mut self) -> Result<()> {
        if self.save()? {
            return Ok(());
        }
        Err(self.not_saved_error())
    }

    /// Assign `attributes` and save, inside the `Update` callback chain.
    pub fn update(&mut self, attributes: Value) -> Result<bool> {
        let input = attribute_object(self.model().name(), attributes)?;
        let model = self.model().clone();
        let outcome = model.callbacks().run(Operation::Update, self, &mut |record: &mut Record| -> Result<bool> {
            record.assign_map(&input)?;
            record.save()
        })?;
        Ok(outcome.succeeded())
    }

    pub fn update_strict(&mut self, attributes: Value) -> Result<()> {
        if self.update(attributes)? {
            return Ok(());
        }
        Err(self.not_saved_error())
    }

    /// Assign one attribute, touch and save.
    pub fn update_attribute(&mut self, name: &str, value: impl Into<Value>) -> Result<bool> {
        let kind = self.model().schema().require(name)?.kind;
        let value = value.into();
        if self.is_persisted() && self.model().is_readonly_attribute(name) {
            let incoming = kind.cast(name, &value)?;
            if incoming != self.attribute_was(name)? {
                return Err(readonly_attribute(name));
            }
        }
        self.set(name, value)?;
        self.touch();
        self.save()
    }

    /// Run the `Destroy` chain, delete the stored document if there is one
    /// and mark the record destroyed. Destroying twice is harmless.
    pub fn destroy(&mut self) -> Result<bool> {
        self.ensure_writable()?;
        let model = self.model().clone();
        let outcome = model.callbacks().run(Operation::Destroy, self, &mut |record: &mut Record| -> Result<bool> {
            record.delete()?;
            Ok(true)
        })?;
        Ok(outcome.succeeded())
    }

    /// Like [`Record::destroy`] but fails with `RecordNotDestroyed` unless a
    /// stored document was actually removed.
    pub fn destroy_strict(&mut self) -> Result<()> {
        self.ensure_writable()?;
        let model = self.model().clone();
        let outcome = model.callbacks().run(Operation::Destroy, self, &mut |record: &mut Record| -> Result<bool> {
            let removed = record.is_persisted() && record.model().backend().delete(&record.key())?;
            if removed {
                record.mark_destroyed();
            }
            Ok(removed)
        })?;
        if outcome.succeeded() {
            Ok(())
        } else {
            Err(RecordError::RecordNotDestroyed(
                "Failed to destroy the record".to_string(),
            ))
        }
    }

    /// Remove the stored document without running callbacks.
    pub fn delete(&mut self) -> Result<()> {
        if self.is_persisted() {
            let removed = self.model().backend().delete(&self.key())?;
            debug!(target: "kvrecord::persistence", model = self.model().name(), id = self.id(), removed, "record deleted");
        }
        self.mark_destroyed();
        Ok(())
    }

    /// Overwrite attributes, dirty baseline, version history and timestamps
    /// from the store.
    pub fn reload(&mut self) -> Result<()> {
        if !self.is_persisted() {
            return Err(RecordError::RecordNotSaved(
                "Can't load model that hasn't been saved".to_string(),
            ));
        }
        let model = self.model().clone();
        let doc = model
            .load_document(self.id())?
            .ok_or_else(|| model.not_found(self.id()))?;
        let fresh = model.instantiate(self.id(), doc);

        let enabled = self.is_versioning_enabled();
        let mut ledger = fresh.ledger().clone();
        ledger.set_enabled(enabled);
        self.replace_ledger(ledger);

        let tracker = fresh.tracker().clone();
        *self.tracker_mut() = tracker;
        self.set_created_at(fresh.created_at());
        self.set_updated_at(fresh.updated_at());
        self.set_previously_new_record(false);
        self.clear_errors();
        Ok(())
    }

    /// Add `by` to a numeric attribute. A null value counts as zero.
    pub fn increment(&mut self, name: &str, by: i64) -> Result<()> {
        self.ensure_not_destroyed()?;
        let spec = self.model().schema().require(name)?;
        if !spec.kind.is_numeric() {
            return Err(RecordError::InvalidValue {
                attribute: name.to_string(),
                expected: "numeric",
                got: format!("{:?} attribute", spec.kind),
            });
        }
        if self.model().is_readonly_attribute(name) {
            return Err(readonly_attribute(name));
        }
        let kind = spec.kind;
        let next = match (kind, self.get(name)?) {
            (AttributeKind::Float, current) => {
                AttrValue::Float(current.as_f64().unwrap_or(0.0) + by as f64)
            }
            (_, current) => {
                let current = current.as_i64().unwrap_or(0);
                let sum = current.checked_add(by).ok_or_else(|| overflow(name, current, by))?;
                AttrValue::Integer(sum)
            }
        };
        self.tracker_mut().put(name, next);
        Ok(())
    }

    pub fn increment_and_save(&mut self, name: &str, by: i64) -> Result<bool> {
        self.increment(name, by)?;
        self.save()
    }

    pub fn decrement(&mut self, name: &str, by: i64) -> Result<()> {
        self.increment(name, negate(name, by)?)
    }

    pub fn decrement_and_save(&mut self, name: &str, by: i64) -> Result<bool> {
        self.increment_and_save(name, negate(name, by)?)
    }

    /// Flip a boolean attribute. A null value counts as false.
    pub fn toggle(&mut self, name: &str) -> Result<()> {
        self.ensure_not_destroyed()?;
        let spec = self.model().schema().require(name)?;
        if spec.kind != AttributeKind::Boolean {
            return Err(RecordError::InvalidValue {
                attribute: name.to_string(),
                expected: "boolean",
                got: format!("{:?} attribute", spec.kind),
            });
        }
        let flipped = !self.get(name)?.is_truthy();
        self.tracker_mut().put(name, AttrValue::Bool(flipped));
        Ok(())
    }

    pub fn toggle_and_save(&mut self, name: &str) -> Result<bool> {
        self.toggle(name)?;
        let value = self.get(name)?.to_json();
        self.update_attribute(name, value)
    }

    /// Stamp `updated_at` with the current time without saving.
    pub fn touch(&mut self) {
        self.set_updated_at(Utc::now());
    }

    pub fn rollback_and_save(&mut self, name: &str) -> Result<bool> {
        self.rollback(name)?;
        self.save()
    }

    pub fn rollback_all_and_save(&mut self) -> Result<bool> {
        self.rollback_all();
        self.save()
    }

    fn create_or_update(&mut self) -> Result<bool> {
        self.ensure_writable()?;
        if self.is_persisted() {
            let readonly: Vec<String> = self
                .model()
                .schema()
                .readonly_attrs()
                .map(str::to_string)
                .collect();
            for name in readonly {
                if self.is_changed(&name)? {
                    return Err(readonly_attribute(&name));
                }
            }
        }
        if self.is_destroyed() {
            return Ok(false);
        }

        let now = Utc::now();
        self.set_updated_at(now);
        let was_new = self.is_new_record();

        let mut ledger = self.ledger().clone();
        if self.model().is_versioned() && !was_new {
            if let Some(stored) = self.model().load_document(self.id())? {
                ledger.absorb(VersionLedger::from_stored(
                    self.model().schema(),
                    stored.current_version,
                    stored.versions.as_ref(),
                ));
            }
        }
        if ledger.is_enabled() {
            ledger.append(self.attributes().clone(), now);
        }

        let doc = StoredDocument {
            attributes: self.tracker().attributes().to_json(),
            previous_attributes: map_to_json(&self.tracker().pending_previous()),
            created_at: self.created_at(),
            updated_at: now,
            current_version: ledger.latest(),
            versions: ledger.to_stored(),
        };
        self.model().backend().set(&self.key(), &doc.to_json()?)?;

        let version = ledger.current_version();
        self.replace_ledger(ledger);
        self.tracker_mut().commit();
        self.set_state(LifecycleState::Persisted);
        self.set_previously_new_record(was_new);

        if was_new {
            info!(target: "kvrecord::persistence", model = self.model().name(), id = self.id(), ?version, "record created");
        } else {
            debug!(target: "kvrecord::persistence", model = self.model().name(), id = self.id(), ?version, "record updated");
        }
        Ok(true)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.model().is_readonly() {
            return Err(RecordError::ReadOnlyRecord(format!(
                "{} is marked as readonly",
                self.model().name()
            )));
        }
        Ok(())
    }

    fn mark_destroyed(&mut self) {
        self.set_state(LifecycleState::Destroyed);
        self.ledger_mut().clear();
    }

    fn not_saved_error(&self) -> RecordError {
        if self.errors().is_empty() {
            RecordError::RecordNotSaved("Failed to save the record".to_string())
        } else {
            RecordError::RecordInvalid(self.errors().full_messages().join(", "))
        }
    }
}

fn readonly_attribute(name: &str) -> RecordError {
    RecordError::ReadOnlyRecord(format!("{} is marked as readonly", name))
}

fn overflow(name: &str, current: i64, by: i64) -> RecordError {
    RecordError::InvalidValue {
        attribute: name.to_string(),
        expected: "integer within i64 range",
        got: format!("{} + {}", current, by),
    }
}

fn negate(name: &str, by: i64) -> Result<i64> {
    by.checked_neg().ok_or_else(|| RecordError::InvalidValue {
        attribute: name.to_string(),
        expected: "integer within i64 range",
        got: format!("-({})", by),
    })
}
