//! # Configuration
//!
//! Store configuration is managed by [`clapfig`], which handles layered
//! loading from TOML files and environment variables.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `KVRECORD__BACKEND`, `KVRECORD__DATA_DIR`.
//! 2. **`kvrecord.toml`** in each search directory, later directories
//!    overriding earlier ones.
//! 3. **Compiled defaults** via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `backend` | `memory` | `memory` or `fs` |
//! | `data_dir` | OS data dir | Root directory for the `fs` backend |
//!
//! ```toml
//! backend = "fs"
//! data_dir = "/var/lib/myapp/records"
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use clapfig::{Clapfig, SearchMode, SearchPath};
use confique::Config;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RecordError, Result};
use crate::store::{FsBackend, KvBackend, MemBackend};

pub const CONFIG_FILE: &str = "kvrecord.toml";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Fs,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Fs => write!(f, "fs"),
        }
    }
}

/// Backend selection, stored in `kvrecord.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Which backend `open` returns: "memory" or "fs".
    #[config(default = "memory")]
    pub backend: BackendKind,

    /// Root directory for the fs backend. When absent, the OS data
    /// directory for kvrecord is used.
    pub data_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            data_dir: None,
        }
    }
}

impl StoreConfig {
    /// Load from `kvrecord.toml` in `search_dirs` and `KVRECORD__*`
    /// variables. A config that fails to load is logged and replaced by the
    /// defaults.
    pub fn load(search_dirs: Vec<PathBuf>) -> Self {
        let search_paths: Vec<SearchPath> = search_dirs.into_iter().map(SearchPath::Path).collect();
        match Clapfig::builder()
            .app_name("kvrecord")
            .file_name(CONFIG_FILE)
            .search_paths(search_paths)
            .search_mode(SearchMode::Merge)
            .load()
        {
            Ok(config) => config,
            Err(err) => {
                warn!(target: "kvrecord::config", error = %err, "failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Directory the fs backend writes to.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        ProjectDirs::from("dev", "kvrecord", "kvrecord")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| RecordError::Config("could not determine a data directory".to_string()))
    }

    /// Construct the configured backend.
    pub fn open(&self) -> Result<Arc<dyn KvBackend>> {
        let backend: Arc<dyn KvBackend> = match self.backend {
            BackendKind::Memory => Arc::new(MemBackend::new()),
            BackendKind::Fs => Arc::new(FsBackend::new(self.data_dir()?)),
        };
        debug!(target: "kvrecord::config", backend = %self.backend, "opened store");
        Ok(backend)
    }
}
