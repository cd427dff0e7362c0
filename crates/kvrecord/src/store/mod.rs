//! # Storage Layer
//!
//! The storage layer is a plain key-value boundary. Everything above it
//! (records, finders, versioning) talks to the store through four calls:
//!
//! - `get(key)` → document or absent
//! - `set(key, document)` → whole-document replace
//! - `delete(key)`
//! - `scan(prefix)` → matching keys
//!
//! ## Keyspace
//!
//! ```text
//! Widget:5f0c...        # one document per record, see [`document`]
//! Widget:9a41...
//! Gadget:users:7:cart   # parent-linked record (id derived from the parent)
//! ```
//!
//! Finders scan the `"{TypeName}:"` prefix. There is no secondary index, so
//! `all`, `where` and `count` cost one pass over the type's keys.
//!
//! ## Implementations
//!
//! - [`mem_backend::MemBackend`]: in-process map, for tests and ephemeral use.
//! - [`fs_backend::FsBackend`]: one JSON file per key with atomic writes.

pub mod backend;
pub mod document;
pub mod fs_backend;
pub mod mem_backend;

pub use backend::KvBackend;
pub use document::{
    document_key, id_from_key, is_valid_id, key_prefix, StoredDocument, StoredVersion,
};
pub use fs_backend::FsBackend;
pub use mem_backend::MemBackend;
