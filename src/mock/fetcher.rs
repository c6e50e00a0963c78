//! Scripted remote fetcher

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use chrono::Utc;

use crate::fetch::{ConnectionOptions, FetchResponse, RemoteFetcher};
use crate::store::{ConfigInfo, FetchFailureReason, LayeredConfig, NamespacedConfigData};
use crate::store::DEFAULT_NAMESPACE;

/// Remote fetcher double serving a configurable key/value map.
///
/// Each successful fetch stamps the returned layer with a strictly
/// increasing timestamp so back-to-back fetches in the same millisecond
/// still look newer than the previous one.
#[derive(Debug, Default)]
pub struct MockFetcher {
    values: Mutex<BTreeMap<String, String>>,
    delay: Option<Duration>,
    fail_next: AtomicBool,
    calls: AtomicUsize,
    last_timestamp_ms: AtomicI64,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetcher that serves `values` for the default namespace.
    pub fn with_values(values: BTreeMap<String, String>) -> Self {
        Self {
            values: Mutex::new(values),
            ..Self::default()
        }
    }

    /// Add artificial latency to every fetch, to hold a fetch in flight
    /// while a test exercises single-flight behavior.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the served values; the next fetch returns them.
    pub fn set_values(&self, values: BTreeMap<String, String>) {
        *self.values.lock().unwrap_or_else(PoisonError::into_inner) = values;
    }

    /// Make the next fetch fail with a remote error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// How many times `fetch` has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_timestamp_ms(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_timestamp_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .map(|last| now.max(last + 1))
            .unwrap_or(now)
    }
}

impl RemoteFetcher for MockFetcher {
    fn fetch(
        &self,
        _options: &ConnectionOptions,
        _snapshot: &LayeredConfig,
        _cache_expiration_seconds: u64,
    ) -> FetchResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        let now = Utc::now();
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return FetchResponse::failure(ConfigInfo::failure(now, FetchFailureReason::Error));
        }

        let values = self
            .values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let fetched =
            NamespacedConfigData::with_namespace(DEFAULT_NAMESPACE, values, self.next_timestamp_ms());
        FetchResponse::success(fetched, ConfigInfo::success(now))
    }
}
