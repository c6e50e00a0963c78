//! Layered config store
//!
//! Three layers of namespaced key/value data (`defaults`, `fetched`,
//! `active`) plus fetch metadata and settings. The whole struct is the
//! persisted snapshot and the unit protected by the engine's single lock;
//! it owns no threads of its own.

mod data;
mod metadata;

pub use data::NamespacedConfigData;
pub use metadata::{
    ConfigInfo, ConfigSetting, FetchFailureReason, LastFetchStatus, RemoteConfigMetadata,
};

use serde::{Deserialize, Serialize};

use crate::value::ValueSource;

/// The single namespace exercised by the public surface. The data model is
/// multi-namespace; the getters are not.
pub const DEFAULT_NAMESPACE: &str = "configns:default";

/// The full layered state: three data layers plus metadata.
///
/// `defaults` is written only by the caller, `fetched` only by the fetch
/// worker, `active` only by activation. `active.timestamp_ms()` never
/// exceeds `fetched.timestamp_ms()` outside a locked write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayeredConfig {
    /// Caller-supplied fallback values.
    pub defaults: NamespacedConfigData,
    /// Most recent remote fetch result, not yet served to readers.
    pub fetched: NamespacedConfigData,
    /// The layer typed getters actually read (with `defaults` as fallback).
    pub active: NamespacedConfigData,
    /// Last-fetch info, per-namespace digests, settings.
    pub metadata: RemoteConfigMetadata,
}

impl LayeredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key` in the default namespace: active layer first, then
    /// defaults. Returns the winning layer's source tag and value.
    pub fn lookup(&self, key: &str) -> Option<(ValueSource, String)> {
        if let Some(value) = self.active.value(DEFAULT_NAMESPACE, key) {
            return Some((ValueSource::Remote, value.to_string()));
        }
        if let Some(value) = self.defaults.value(DEFAULT_NAMESPACE, key) {
            return Some((ValueSource::Default, value.to_string()));
        }
        None
    }

    /// Promote `fetched` to `active`.
    ///
    /// No-op returning false when there is nothing newer to promote
    /// (`fetched.timestamp_ms <= active.timestamp_ms`); otherwise a deep
    /// copy, never an aliased view.
    pub fn activate(&mut self) -> bool {
        if self.fetched.timestamp_ms() <= self.active.timestamp_ms() {
            return false;
        }
        self.active = self.fetched.clone();
        true
    }
}
