//! Namespaced key/value data for one config layer

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One layer of configuration: namespace → (key → string value), plus the
/// epoch-millisecond timestamp of the write that produced it.
///
/// Namespaces only grow: `set_namespace` replaces one namespace wholesale
/// but never prunes its siblings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamespacedConfigData {
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
    timestamp_ms: i64,
}

impl NamespacedConfigData {
    /// Empty layer with a zero timestamp ("never written").
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer holding a single namespace, stamped with `timestamp_ms`.
    pub fn with_namespace(
        namespace: &str,
        values: BTreeMap<String, String>,
        timestamp_ms: i64,
    ) -> Self {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(namespace.to_string(), values);
        Self {
            namespaces,
            timestamp_ms,
        }
    }

    /// Replace the contents of one namespace wholesale.
    ///
    /// A key absent from `values` no longer exists in that namespace after
    /// this call; other namespaces are untouched.
    pub fn set_namespace(&mut self, namespace: &str, values: BTreeMap<String, String>) {
        self.namespaces.insert(namespace.to_string(), values);
    }

    /// Whether `key` exists in `namespace`.
    pub fn has_value(&self, namespace: &str, key: &str) -> bool {
        self.namespaces
            .get(namespace)
            .is_some_and(|ns| ns.contains_key(key))
    }

    /// Stored string for `key` in `namespace`, if any.
    pub fn value(&self, namespace: &str, key: &str) -> Option<&str> {
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .map(String::as_str)
    }

    /// Collect keys of `namespace` starting with `prefix` into `out`.
    ///
    /// The empty prefix matches every key. Appending into a shared set lets
    /// callers merge several layers and de-duplicate for free.
    pub fn keys_by_prefix(&self, namespace: &str, prefix: &str, out: &mut BTreeSet<String>) {
        if let Some(ns) = self.namespaces.get(namespace) {
            for key in ns.keys() {
                if key.starts_with(prefix) {
                    out.insert(key.clone());
                }
            }
        }
    }

    /// Names of every namespace present in this layer.
    pub fn namespace_names(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// Epoch-millisecond timestamp of the write that produced this layer.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Stamp this layer. Used by fetchers when building a fetch result.
    pub fn set_timestamp_ms(&mut self, timestamp_ms: i64) {
        self.timestamp_ms = timestamp_ms;
    }

    /// Content digest of one namespace: SHA-256 hex over the canonical JSON
    /// (RFC 8785) of its key/value map. `None` when the namespace is absent
    /// from this layer.
    pub fn digest(&self, namespace: &str) -> Option<String> {
        let values = self.namespaces.get(namespace)?;
        let canonical = serde_json_canonicalizer::to_vec(values).ok()?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Some(hex::encode(hasher.finalize()))
    }
}
