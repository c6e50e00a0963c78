//! Durable snapshot storage
//!
//! The engine persists the whole [`LayeredConfig`] through the
//! [`ConfigStorage`] trait: one `load` at construction, `save` whenever the
//! save worker drains a signal. [`FileStorage`] is the stock
//! implementation — pretty JSON, written atomically via write-then-rename.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::store::LayeredConfig;

/// Errors from the stock file codec.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable store codec consumed by the engine.
///
/// `save` failures are swallowed by the save worker — a lost save is
/// recovered by the next mutation or fetch — so implementations should do
/// their own logging if they care.
pub trait ConfigStorage: Send + Sync {
    /// Load the persisted snapshot; `Ok(None)` when nothing was persisted.
    fn load(&self) -> Result<Option<LayeredConfig>, StorageError>;

    /// Persist a snapshot.
    fn save(&self, snapshot: &LayeredConfig) -> Result<(), StorageError>;
}

/// JSON-file snapshot storage.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStorage for FileStorage {
    fn load(&self) -> Result<Option<LayeredConfig>, StorageError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&self, snapshot: &LayeredConfig) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(snapshot)?;

        // Write to temp file first, then atomic rename.
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }
}
