//! # kvrecord Architecture
//!
//! kvrecord stores structured records as JSON documents in a key-value
//! store and gives them an ActiveRecord-style lifecycle: create, update,
//! destroy, dirty tracking, callbacks, version history and finders, without
//! a relational database behind them.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Model layer (model.rs, finder.rs, link.rs)                 │
//! │  - Per-type schema, callbacks, validators                   │
//! │  - Class-level queries: all, filter, find_by, ordinals      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Record layer (record.rs, persistence.rs)                   │
//! │  - New → Persisted → Destroyed state machine                │
//! │  - save/update/destroy wrapped in the callback pipeline     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Engine (dirty.rs, versions.rs, callbacks.rs, attributes/)  │
//! │  - ChangeTracker: current / last saved / before last save   │
//! │  - VersionLedger: append-only numbered snapshots            │
//! │  - CallbackPipeline: before / around / after with halting   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage layer (store/)                                     │
//! │  - KvBackend trait: get / set / delete / scan / exists      │
//! │  - MemBackend (testing), FsBackend (one file per key)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use kvrecord::{AttributeKind, Model, StoreConfig};
//! use serde_json::json;
//!
//! let backend = StoreConfig::default().open()?;
//! let widgets = Model::builder("Widget")
//!     .attribute("count", AttributeKind::Integer)
//!     .build(backend)?;
//!
//! let mut w = widgets.create(json!({"count": 1}))?;
//! w.update(json!({"count": 2}))?;
//! assert!(w.saved_change_to_attribute("count")?);
//!
//! w.destroy()?;
//! assert!(widgets.find(w.id()).is_err());
//! ```
//!
//! ## Concurrency
//!
//! Everything is synchronous. Backends are `Send + Sync` and shared through
//! `Arc`; records are owned by the caller. There is no record-level
//! locking: concurrent saves of the same record are last-write-wins.
//!
//! ## Logging
//!
//! The crate emits `tracing` events under `kvrecord::*` targets and installs
//! no subscriber.

pub mod attributes;
pub mod callbacks;
pub mod config;
pub mod dirty;
pub mod error;
pub mod finder;
pub mod link;
pub mod model;
pub mod naming;
pub mod persistence;
pub mod record;
pub mod store;
pub mod validations;
pub mod versions;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use attributes::{
    AttrFilter, AttrMap, AttrValue, AttributeKind, AttributeSchema, AttributeSpec, FilterOp,
};
pub use callbacks::{Flow, Next, Operation, Outcome, Phase};
pub use config::{BackendKind, StoreConfig};
pub use dirty::{Change, ChangeTracker};
pub use error::{RecordError, Result};
pub use finder::Query;
pub use model::{Model, ModelBuilder};
pub use record::{LifecycleState, Record};
pub use store::{FsBackend, KvBackend, MemBackend};
pub use validations::ValidationErrors;
pub use versions::{Version, VersionLedger};
