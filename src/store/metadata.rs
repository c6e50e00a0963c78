//! Fetch metadata and engine settings
//!
//! Tracks the outcome of the most recent remote fetch (status, time,
//! failure reason, per-namespace digests) plus the small keyed settings map
//! the fetch-eligibility logic consults. Digests and info are only ever
//! copied in from fetch results, never derived from the defaults or active
//! layers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent remote fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LastFetchStatus {
    /// No fetch has completed yet.
    Pending,
    /// The most recent fetch succeeded.
    Success,
    /// The most recent fetch failed; see the failure reason.
    Failure,
}

/// Why the most recent fetch failed, when it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FetchFailureReason {
    /// No failure has been recorded.
    Invalid,
    /// The remote endpoint rejected or errored the request.
    Error,
    /// The remote endpoint throttled the request.
    Throttled,
}

/// Keyed engine settings, mutated by `set_config_setting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSetting {
    /// Minimum interval between fetches, consulted by eligibility logic.
    MinimumFetchInterval,
    /// Developer mode flag; relaxes client-side throttling in the fetcher.
    DeveloperMode,
}

/// Snapshot of fetch state surfaced to callers via `info()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigInfo {
    /// Status of the most recent fetch.
    pub last_fetch_status: LastFetchStatus,
    /// Completion time of the most recent fetch attempt, if any.
    pub last_fetch_time: Option<DateTime<Utc>>,
    /// Failure reason for the most recent fetch, `Invalid` when none.
    pub last_fetch_failure_reason: FetchFailureReason,
}

impl Default for ConfigInfo {
    fn default() -> Self {
        Self {
            last_fetch_status: LastFetchStatus::Pending,
            last_fetch_time: None,
            last_fetch_failure_reason: FetchFailureReason::Invalid,
        }
    }
}

impl ConfigInfo {
    /// Info for a successful fetch completed at `time`.
    pub fn success(time: DateTime<Utc>) -> Self {
        Self {
            last_fetch_status: LastFetchStatus::Success,
            last_fetch_time: Some(time),
            last_fetch_failure_reason: FetchFailureReason::Invalid,
        }
    }

    /// Info for a failed fetch attempted at `time`.
    pub fn failure(time: DateTime<Utc>, reason: FetchFailureReason) -> Self {
        Self {
            last_fetch_status: LastFetchStatus::Failure,
            last_fetch_time: Some(time),
            last_fetch_failure_reason: reason,
        }
    }
}

/// Fetch metadata plus the settings map, persisted alongside the layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfigMetadata {
    info: ConfigInfo,
    digests: BTreeMap<String, String>,
    settings: BTreeMap<ConfigSetting, String>,
}

impl RemoteConfigMetadata {
    /// Current fetch info.
    pub fn info(&self) -> &ConfigInfo {
        &self.info
    }

    /// Replace the fetch info (copied from a fetch result).
    pub fn set_info(&mut self, info: ConfigInfo) {
        self.info = info;
    }

    /// Per-namespace digests from the most recent fetch.
    pub fn digests(&self) -> &BTreeMap<String, String> {
        &self.digests
    }

    /// Replace the digest map (copied from a fetch result).
    pub fn set_digests(&mut self, digests: BTreeMap<String, String>) {
        self.digests = digests;
    }

    /// Read a setting; empty string when never set.
    pub fn setting(&self, setting: ConfigSetting) -> String {
        self.settings.get(&setting).cloned().unwrap_or_default()
    }

    /// Write a setting, last write wins.
    pub fn add_setting(&mut self, setting: ConfigSetting, value: &str) {
        self.settings.insert(setting, value.to_string());
    }
}
