//! # Model Types
//!
//! A model type is declared once with [`ModelBuilder`] and is immutable
//! afterwards: its attribute schema, read-only flags, versioning default,
//! callbacks and validators are fixed when [`ModelBuilder::build`] binds it
//! to a backend.
//!
//! ```ignore
//! let widgets = Model::builder("Widget")
//!     .attribute("count", AttributeKind::Integer)
//!     .versioned()
//!     .before(Operation::Save, "normalize", |w| { /* ... */ Ok(Flow::Continue) })
//!     .build(backend)?;
//!
//! let w = widgets.create(json!({"count": 1}))?;
//! ```
//!
//! [`Model`] is a cheap handle (two `Arc`s) and is what records, finders and
//! parent links hold on to.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::attributes::{AttributeKind, AttributeSchema, AttributeSpec, RESERVED_ATTRIBUTES};
use crate::callbacks::{AroundHook, CallbackPipeline, Flow, Next, Operation};
use crate::dirty::ChangeTracker;
use crate::error::{RecordError, Result};
use crate::naming;
use crate::record::{attribute_object, LifecycleState, Record};
use crate::store::{document_key, is_valid_id, KvBackend, StoredDocument};
use crate::validations::{ValidationErrors, Validator};
use crate::versions::VersionLedger;

/// Static, per-type configuration shared by every record of the type.
pub struct ModelType {
    name: String,
    schema: Arc<AttributeSchema>,
    versioned: bool,
    readonly: bool,
    callbacks: CallbackPipeline,
    validators: Vec<Validator>,
}

pub struct ModelBuilder {
    name: String,
    schema: AttributeSchema,
    versioned: bool,
    readonly: bool,
    callbacks: CallbackPipeline,
    validators: Vec<Validator>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            schema: AttributeSchema::new(name.clone()),
            name,
            versioned: false,
            readonly: false,
            callbacks: CallbackPipeline::new(),
            validators: Vec::new(),
        }
    }

    pub fn attribute(self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attribute_spec(AttributeSpec::new(name, kind))
    }

    pub fn attribute_spec(mut self, spec: AttributeSpec) -> Self {
        self.schema.push(spec);
        self
    }

    /// Mark the whole type read-only: records can be built and read but
    /// never saved or destroyed.
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    /// Keep version history for records of this type.
    pub fn versioned(mut self) -> Self {
        self.versioned = true;
        self
    }

    pub fn before<F>(mut self, op: Operation, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut Record) -> Result<Flow> + Send + Sync + 'static,
    {
        self.callbacks.before(op, name, Arc::new(hook));
        self
    }

    pub fn around<F>(mut self, op: Operation, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut Record, &mut Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        let hook: AroundHook = Arc::new(hook);
        self.callbacks.around(op, name, hook);
        self
    }

    pub fn after<F>(mut self, op: Operation, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut Record) -> Result<()> + Send + Sync + 'static,
    {
        self.callbacks.after(op, name, Arc::new(hook));
        self
    }

    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Record, &mut ValidationErrors) + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Finish the declaration and bind the type to a backend.
    pub fn build(self, backend: Arc<dyn KvBackend>) -> Result<Model> {
        if let Some(reserved) = self
            .schema
            .names()
            .find(|name| RESERVED_ATTRIBUTES.contains(name))
        {
            return Err(RecordError::invalid_attribute(&self.name, reserved));
        }
        debug!(target: "kvrecord::model", model = %self.name, attributes = self.schema.specs().len(), versioned = self.versioned, "model type declared");
        Ok(Model {
            ty: Arc::new(ModelType {
                name: self.name,
                schema: Arc::new(self.schema),
                versioned: self.versioned,
                readonly: self.readonly,
                callbacks: self.callbacks,
                validators: self.validators,
            }),
            backend,
        })
    }
}

/// Handle to a declared model type and the backend its records live in.
#[derive(Clone)]
pub struct Model {
    ty: Arc<ModelType>,
    backend: Arc<dyn KvBackend>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.ty.name)
            .field("attributes", &self.ty.schema.names().collect::<Vec<_>>())
            .field("versioned", &self.ty.versioned)
            .field("readonly", &self.ty.readonly)
            .field("callbacks", &self.ty.callbacks)
            .finish()
    }
}

impl Model {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.ty.name
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.ty.schema
    }

    pub fn backend(&self) -> &Arc<dyn KvBackend> {
        &self.backend
    }

    pub fn is_versioned(&self) -> bool {
        self.ty.versioned
    }

    pub fn is_readonly(&self) -> bool {
        self.ty.readonly
    }

    pub fn is_readonly_attribute(&self, name: &str) -> bool {
        self.ty.schema.get_spec(name).is_some_and(|spec| spec.readonly)
    }

    /// Plural snake-case name, e.g. `"widgets"`.
    pub fn collection_name(&self) -> String {
        naming::collection(&self.ty.name)
    }

    pub fn key(&self, id: &str) -> String {
        document_key(&self.ty.name, id)
    }

    pub(crate) fn callbacks(&self) -> &CallbackPipeline {
        &self.ty.callbacks
    }

    pub(crate) fn validators(&self) -> &[Validator] {
        &self.ty.validators
    }

    pub(crate) fn shared_schema(&self) -> Arc<AttributeSchema> {
        self.ty.schema.clone()
    }

    /// Build an unsaved record from a JSON object of attributes.
    ///
    /// An `"id"` entry sets the record id; without one a UUID v4 is
    /// generated. When the supplied id already exists in the store the
    /// record starts out persisted, so saving it overwrites that document.
    /// `created_at`/`updated_at` entries are ignored.
    pub fn build(&self, attributes: Value) -> Result<Record> {
        let mut input = attribute_object(&self.ty.name, attributes)?;
        input.remove("created_at");
        input.remove("updated_at");
        let supplied_id = match input.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id),
            Some(other) => Some(other.to_string()),
        };

        if let Some(id) = supplied_id.as_deref().filter(|id| !is_valid_id(id)) {
            return Err(RecordError::invalid_id(id));
        }
        let state = match &supplied_id {
            Some(id) if self.backend.exists(&self.key(id))? => LifecycleState::Persisted,
            _ => LifecycleState::New,
        };
        let id = supplied_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut record = Record::assemble(
            self.clone(),
            id,
            state,
            ChangeTracker::new(self.shared_schema()),
            VersionLedger::new(self.ty.versioned),
            Utc::now(),
        );
        record.tracker_mut().assign_all(&input)?;
        Ok(record)
    }

    /// A record holding only defaults.
    pub fn new_record(&self) -> Record {
        Record::assemble(
            self.clone(),
            Uuid::new_v4().to_string(),
            LifecycleState::New,
            ChangeTracker::new(self.shared_schema()),
            VersionLedger::new(self.ty.versioned),
            Utc::now(),
        )
    }

    /// Build and save. The record is returned even when a hook or validator
    /// stopped the save; check `is_persisted()` or use [`Model::create_strict`].
    pub fn create(&self, attributes: Value) -> Result<Record> {
        let mut record = self.build(attributes)?;
        record.save()?;
        Ok(record)
    }

    pub fn create_strict(&self, attributes: Value) -> Result<Record> {
        let mut record = self.build(attributes)?;
        record.save_strict()?;
        Ok(record)
    }

    /// Read and decode the stored document for `id`.
    pub(crate) fn load_document(&self, id: &str) -> Result<Option<StoredDocument>> {
        match self.backend.get(&self.key(id))? {
            Some(raw) => Ok(Some(StoredDocument::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    /// Reconstruct a persisted record from its stored document.
    pub(crate) fn instantiate(&self, id: &str, doc: StoredDocument) -> Record {
        let schema = self.shared_schema();
        let attributes = crate::attributes::AttributeSet::decode(&schema, &doc.attributes);
        let previous = crate::attributes::AttributeSet::decode(&schema, &doc.previous_attributes);
        let tracker = ChangeTracker::from_stored(schema.clone(), &attributes, previous);

        let mut ledger =
            VersionLedger::from_stored(&schema, doc.current_version, doc.versions.as_ref());
        ledger.set_enabled(self.ty.versioned);

        let mut record = Record::assemble(
            self.clone(),
            id.to_string(),
            LifecycleState::Persisted,
            tracker,
            ledger,
            doc.created_at,
        );
        record.set_updated_at(doc.updated_at);
        record
    }

    pub(crate) fn not_found(&self, id: &str) -> RecordError {
        RecordError::RecordNotFound(format!("Couldn't find {} with id {}", self.ty.name, id))
    }
}
