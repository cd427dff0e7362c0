use crate::error::Result;

/// Abstract interface for raw key-value I/O.
///
/// This trait handles the "how" of storage (filesystem vs memory), while
/// [`Model`](crate::model::Model) and [`Record`](crate::record::Record) handle
/// the "what" (documents, lifecycle, versioning).
///
/// Values are whole JSON documents stored as text. Every write replaces the
/// previous document; there are no partial updates and no compare-and-swap,
/// so concurrent writers to one key resolve as last-write-wins.
pub trait KvBackend: Send + Sync {
    /// Read the document stored under `key`.
    /// Returns Ok(None) if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `document` under `key`, replacing any previous value.
    fn set(&self, key: &str, document: &str) -> Result<()>;

    /// Remove `key`. Returns whether a value was actually removed.
    fn delete(&self, key: &str) -> Result<bool>;

    /// List every key starting with `prefix`.
    ///
    /// Not snapshot-consistent: keys written or removed while the scan runs
    /// may or may not appear.
    fn scan(&self, prefix: &str) -> Result<Vec<String>>;

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
