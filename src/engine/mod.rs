//! Remote config engine
//!
//! The façade composing the layered store, the two background workers and
//! the outcome registry. One exclusive lock linearizes every store access;
//! it is never held across network or disk I/O. Construction loads the
//! persisted snapshot and starts both workers; drop closes their signal
//! channels and joins them — closing the channels is the only shutdown
//! signal the workers ever receive, and it cancels signalled work the
//! workers never started while letting an in-flight iteration finish.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::Utc;

use crate::fetch::{ConnectionOptions, RemoteFetcher};
use crate::outcome::{FetchFuture, FetchStatus, OutcomeRegistry};
use crate::persist::ConfigStorage;
use crate::signal::SignalChannel;
use crate::store::{ConfigInfo, ConfigSetting, LastFetchStatus, LayeredConfig, DEFAULT_NAMESPACE};
use crate::value::{
    self, ValueInfo, ValueSource, DEFAULT_VALUE_FOR_BOOL, DEFAULT_VALUE_FOR_DATA,
    DEFAULT_VALUE_FOR_DOUBLE, DEFAULT_VALUE_FOR_LONG, DEFAULT_VALUE_FOR_STRING,
};

/// Everything guarded by the engine's single lock.
#[derive(Debug)]
struct Inner {
    configs: LayeredConfig,
    /// True between fetch dispatch and the worker finishing the merge.
    fetch_in_flight: bool,
    /// Expiration window requested by the dispatching `fetch` call.
    cache_expiration_seconds: u64,
    /// Outcome slot for the in-flight fetch.
    pending_handle: Option<Arc<crate::outcome::FetchHandle>>,
}

/// State shared between the caller-facing engine and its workers.
struct Shared {
    inner: Mutex<Inner>,
    registry: OutcomeRegistry,
    fetch_signal: SignalChannel,
    save_signal: SignalChannel,
    fetcher: Arc<dyn RemoteFetcher>,
    storage: Arc<dyn ConfigStorage>,
    options: ConnectionOptions,
}

impl Shared {
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Local configuration cache kept loosely in sync with a remote source of
/// truth. One instance per configuration namespace; all methods are safe to
/// call from any thread and none of them blocks on network I/O.
pub struct RemoteConfigEngine {
    shared: Arc<Shared>,
    fetch_thread: Option<JoinHandle<()>>,
    save_thread: Option<JoinHandle<()>>,
}

impl RemoteConfigEngine {
    /// Load the persisted snapshot (absent or unreadable ⇒ start empty) and
    /// start the save and fetch workers.
    pub fn new(
        options: ConnectionOptions,
        fetcher: Arc<dyn RemoteFetcher>,
        storage: Arc<dyn ConfigStorage>,
    ) -> Self {
        let configs = storage.load().ok().flatten().unwrap_or_default();

        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                configs,
                fetch_in_flight: false,
                cache_expiration_seconds: 0,
                pending_handle: None,
            }),
            registry: OutcomeRegistry::new(),
            fetch_signal: SignalChannel::new(),
            save_signal: SignalChannel::new(),
            fetcher,
            storage,
            options,
        });

        let save_thread = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || save_worker(&shared))
        };
        let fetch_thread = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || fetch_worker(&shared))
        };

        Self {
            shared,
            fetch_thread: Some(fetch_thread),
            save_thread: Some(save_thread),
        }
    }

    /// Replace the entire defaults layer for the default namespace.
    ///
    /// Overwrite semantics: a key absent from `defaults` no longer has a
    /// default value afterwards.
    pub fn set_defaults(&self, defaults: &BTreeMap<String, String>) {
        {
            let mut inner = self.shared.locked();
            inner
                .configs
                .defaults
                .set_namespace(DEFAULT_NAMESPACE, defaults.clone());
        }
        self.shared.save_signal.raise();
    }

    /// Read an engine setting; empty string when never set.
    pub fn config_setting(&self, setting: ConfigSetting) -> String {
        self.shared.locked().configs.metadata.setting(setting)
    }

    /// Write an engine setting.
    pub fn set_config_setting(&self, setting: ConfigSetting, value: &str) {
        {
            let mut inner = self.shared.locked();
            inner.configs.metadata.add_setting(setting, value);
        }
        self.shared.save_signal.raise();
    }

    fn resolve(&self, key: &str) -> Option<(ValueSource, String)> {
        self.shared.locked().configs.lookup(key)
    }

    /// Typed boolean getter; active layer first, then defaults, then the
    /// static default. Conversion failure is reported through `info`, not
    /// an error.
    pub fn get_boolean(&self, key: &str, info: Option<&mut ValueInfo>) -> bool {
        match self.resolve(key) {
            None => {
                write_info(info, ValueSource::Static, true);
                DEFAULT_VALUE_FOR_BOOL
            }
            Some((source, raw)) => match value::parse_bool(&raw) {
                Some(parsed) => {
                    write_info(info, source, true);
                    parsed
                }
                None => {
                    write_info(info, source, false);
                    DEFAULT_VALUE_FOR_BOOL
                }
            },
        }
    }

    /// Typed string getter; the identity projection, so conversion always
    /// succeeds.
    pub fn get_string(&self, key: &str, info: Option<&mut ValueInfo>) -> String {
        match self.resolve(key) {
            None => {
                write_info(info, ValueSource::Static, true);
                DEFAULT_VALUE_FOR_STRING.to_string()
            }
            Some((source, raw)) => {
                write_info(info, source, true);
                raw
            }
        }
    }

    /// Typed integer getter with strict whole-string parsing.
    pub fn get_long(&self, key: &str, info: Option<&mut ValueInfo>) -> i64 {
        match self.resolve(key) {
            None => {
                write_info(info, ValueSource::Static, true);
                DEFAULT_VALUE_FOR_LONG
            }
            Some((source, raw)) => match value::parse_long(&raw) {
                Some(parsed) => {
                    write_info(info, source, true);
                    parsed
                }
                None => {
                    write_info(info, source, false);
                    DEFAULT_VALUE_FOR_LONG
                }
            },
        }
    }

    /// Typed float getter with strict whole-string parsing.
    pub fn get_double(&self, key: &str, info: Option<&mut ValueInfo>) -> f64 {
        match self.resolve(key) {
            None => {
                write_info(info, ValueSource::Static, true);
                DEFAULT_VALUE_FOR_DOUBLE
            }
            Some((source, raw)) => match value::parse_double(&raw) {
                Some(parsed) => {
                    write_info(info, source, true);
                    parsed
                }
                None => {
                    write_info(info, source, false);
                    DEFAULT_VALUE_FOR_DOUBLE
                }
            },
        }
    }

    /// Raw bytes of the stored string, byte for byte. An owned copy, never
    /// a view into the store.
    pub fn get_data(&self, key: &str, info: Option<&mut ValueInfo>) -> Vec<u8> {
        match self.resolve(key) {
            None => {
                write_info(info, ValueSource::Static, true);
                DEFAULT_VALUE_FOR_DATA
            }
            Some((source, raw)) => {
                write_info(info, source, true);
                raw.into_bytes()
            }
        }
    }

    /// All keys across the active and defaults layers, de-duplicated.
    pub fn keys(&self) -> BTreeSet<String> {
        self.keys_by_prefix("")
    }

    /// Keys starting with `prefix` across the active and defaults layers.
    pub fn keys_by_prefix(&self, prefix: &str) -> BTreeSet<String> {
        let mut unique_keys = BTreeSet::new();
        let inner = self.shared.locked();
        inner
            .configs
            .active
            .keys_by_prefix(DEFAULT_NAMESPACE, prefix, &mut unique_keys);
        inner
            .configs
            .defaults
            .keys_by_prefix(DEFAULT_NAMESPACE, prefix, &mut unique_keys);
        unique_keys
    }

    /// Promote the most recent fetch into the active layer. Synchronous;
    /// false when there is nothing newer to promote.
    pub fn activate_fetched(&self) -> bool {
        let activated = {
            let mut inner = self.shared.locked();
            inner.configs.activate()
        };
        if activated {
            self.shared.save_signal.raise();
        }
        activated
    }

    /// Status, time and failure reason of the most recent fetch.
    pub fn info(&self) -> ConfigInfo {
        self.shared.locked().configs.metadata.info().clone()
    }

    /// Schedule a remote fetch unless one is in flight or the fetched layer
    /// is younger than `cache_expiration_seconds` (0 forces a fetch).
    ///
    /// Never blocks on the network. Always returns the most recently
    /// dispatched outcome, so an ineligible call piggybacks on the existing
    /// result instead of scheduling new work. Staleness is judged against
    /// the fetched layer's timestamp, not the active one: repeated fetches
    /// without activation keep refreshing `fetched` while `active` ages.
    pub fn fetch(&self, cache_expiration_seconds: u64) -> FetchFuture {
        let now_ms = Utc::now().timestamp_millis();
        let window_ms = i64::try_from(cache_expiration_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);

        let dispatch = {
            let mut inner = self.shared.locked();
            let cache_expires_at_ms = inner.configs.fetched.timestamp_ms().saturating_add(window_ms);
            let stale = cache_expiration_seconds == 0 || cache_expires_at_ms < now_ms;

            if !inner.fetch_in_flight && stale {
                inner.pending_handle = Some(self.shared.registry.allocate());
                inner.fetch_in_flight = true;
                inner.cache_expiration_seconds = cache_expiration_seconds;
                true
            } else {
                false
            }
        };

        if dispatch {
            self.shared.fetch_signal.raise();
        }
        self.fetch_last_result()
    }

    /// Outcome of the most recently dispatched fetch (a never-resolving
    /// pending handle when no fetch has ever been dispatched).
    pub fn fetch_last_result(&self) -> FetchFuture {
        self.shared.registry.last()
    }
}

impl Drop for RemoteConfigEngine {
    fn drop(&mut self) {
        self.shared.fetch_signal.close();
        if let Some(handle) = self.fetch_thread.take() {
            let _ = handle.join();
        }

        self.shared.save_signal.close();
        if let Some(handle) = self.save_thread.take() {
            let _ = handle.join();
        }
    }
}

fn write_info(info: Option<&mut ValueInfo>, source: ValueSource, conversion_successful: bool) {
    if let Some(info) = info {
        info.source = source;
        info.conversion_successful = conversion_successful;
    }
}

/// Fetch worker: one remote refresh per signal. Snapshots the store under
/// the lock, fetches with the lock released, then merges the result and
/// resolves the caller's outcome.
fn fetch_worker(shared: &Shared) {
    while shared.fetch_signal.next() {
        let (snapshot, expiration, handle) = {
            let inner = shared.locked();
            (
                inner.configs.clone(),
                inner.cache_expiration_seconds,
                inner.pending_handle.clone(),
            )
        };

        let response = shared
            .fetcher
            .fetch(&shared.options, &snapshot, expiration);

        let outcome = {
            let mut inner = shared.locked();
            if let Some(fetched) = response.fetched {
                let digests: BTreeMap<String, String> = fetched
                    .namespace_names()
                    .filter_map(|ns| fetched.digest(ns).map(|digest| (ns.to_string(), digest)))
                    .collect();
                inner.configs.fetched = fetched;
                inner.configs.metadata.set_digests(digests);
            }
            inner.configs.metadata.set_info(response.info);
            inner.fetch_in_flight = false;

            if inner.configs.metadata.info().last_fetch_status == LastFetchStatus::Success {
                FetchStatus::Success
            } else {
                FetchStatus::Failure
            }
        };

        shared.save_signal.raise();
        if let Some(handle) = handle {
            handle.complete(outcome);
        }
    }
}

/// Save worker: clone the store under the lock, persist without it. Save
/// failures are swallowed; the next mutation or fetch re-raises the signal.
fn save_worker(shared: &Shared) {
    while shared.save_signal.next() {
        let snapshot = {
            let inner = shared.locked();
            inner.configs.clone()
        };
        let _ = shared.storage.save(&snapshot);
    }
}
