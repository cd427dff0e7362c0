use super::backend::KvBackend;
use crate::error::{RecordError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// In-memory storage backend.
///
/// Keys live in a `BTreeMap` so scans come back in key order. The map sits
/// behind a `RwLock` so one backend can be shared between models and threads.
#[derive(Default)]
pub struct MemBackend {
    entries: RwLock<BTreeMap<String, String>>,
    simulate_write_error: RwLock<bool>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        *self.simulate_write_error.write() = simulate;
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KvBackend for MemBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, document: &str) -> Result<()> {
        if *self.simulate_write_error.read() {
            return Err(RecordError::Store("Simulated write error".to_string()));
        }
        self.entries
            .write()
            .insert(key.to_string(), document.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        if *self.simulate_write_error.read() {
            return Err(RecordError::Store("Simulated write error".to_string()));
        }
        Ok(self.entries.write().remove(key).is_some())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.read().contains_key(key))
    }
}
