//! In-memory snapshot store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::persist::{ConfigStorage, StorageError};
use crate::store::LayeredConfig;

/// Snapshot store double keeping everything in memory.
///
/// `load` serves the preloaded snapshot; every `save` replaces the recorded
/// one and bumps a counter, so tests can observe coalescing. An optional
/// save delay keeps the save worker busy while mutations pile up.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    initial: Mutex<Option<LayeredConfig>>,
    saved: Mutex<Option<LayeredConfig>>,
    save_count: AtomicUsize,
    save_delay: Option<Duration>,
}

impl MemoryStorage {
    /// Empty store; `load` reports nothing persisted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that serves `snapshot` from `load`.
    pub fn preloaded(snapshot: LayeredConfig) -> Self {
        Self {
            initial: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Add artificial latency to every save.
    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = Some(delay);
        self
    }

    /// How many times `save` has been invoked.
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    /// The most recently saved snapshot, if any.
    pub fn last_saved(&self) -> Option<LayeredConfig> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigStorage for MemoryStorage {
    fn load(&self) -> Result<Option<LayeredConfig>, StorageError> {
        Ok(self
            .initial
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &LayeredConfig) -> Result<(), StorageError> {
        if let Some(delay) = self.save_delay {
            thread::sleep(delay);
        }
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
