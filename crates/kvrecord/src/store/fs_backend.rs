use super::backend::KvBackend;
use crate::error::{RecordError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const DOC_EXT: &str = ".json";

/// Filesystem backend: one JSON file per key under a root directory.
///
/// Keys are escaped into file names (`Widget:42` becomes `Widget%3A42.json`)
/// and every write goes through a temp file plus rename, so readers never
/// observe a partially written document.
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file holding `key`.
    pub fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}{}", escape_key(key), DOC_EXT))
    }

    fn ensure_dir(&self) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root).map_err(RecordError::Io)?;
        }
        Ok(())
    }
}

impl KvBackend for FsBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.document_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RecordError::Io(e)),
        }
    }

    fn set(&self, key: &str, document: &str) -> Result<()> {
        self.ensure_dir()?;

        let target_path = self.document_path(key);

        // Atomic Write
        let tmp_path = self.root.join(format!(".doc-{}.tmp", Uuid::new_v4()));
        if let Err(e) = fs::write(&tmp_path, document) {
            let _ = fs::remove_file(&tmp_path);
            return Err(RecordError::Io(e));
        }
        if let Err(e) = fs::rename(&tmp_path, &target_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(RecordError::Io(e));
        }

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.document_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(RecordError::Io(e)),
        }
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(RecordError::Io)?;

        for entry in entries {
            let entry = entry.map_err(RecordError::Io)?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(DOC_EXT) else {
                continue;
            };
            match unescape_key(stem) {
                Some(key) if key.starts_with(prefix) => keys.push(key),
                Some(_) => {}
                None => {
                    debug!(target: "kvrecord::store", file = %name, "skipping file with undecodable name");
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.document_path(key).is_file())
    }
}

/// Escape a key into a portable file stem.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes `%XX`.
pub fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Reverse [`escape_key`]. Returns None for malformed input.
pub fn unescape_key(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_roundtrip_keeps_colons_out_of_file_names() {
        let key = "Blog::Post:users:7:draft";
        let escaped = escape_key(key);
        assert!(!escaped.contains(':'));
        assert_eq!(unescape_key(&escaped).as_deref(), Some(key));
    }

    #[test]
    fn escape_plain_key() {
        assert_eq!(escape_key("Widget:ab-1"), "Widget%3Aab-1");
    }

    #[test]
    fn unescape_rejects_truncated_escape() {
        assert_eq!(unescape_key("abc%3"), None);
        assert_eq!(unescape_key("abc%zz"), None);
    }
}
