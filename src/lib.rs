//! confsync — a local configuration cache kept loosely in sync with a
//! remote source of truth.
//!
//! The store holds three layers of namespaced string values — caller
//! `defaults`, the most recent remote `fetched` result, and the `active`
//! layer served to typed getters — behind one exclusive lock. Two
//! dedicated worker threads handle everything slow: one performs remote
//! refreshes, one persists snapshots, both driven by depth-1 coalescing
//! signal channels so callers never block on network or disk I/O.

pub mod engine;
pub mod fetch;
pub mod mock;
pub mod outcome;
pub mod persist;
pub mod signal;
pub mod store;
pub mod value;

pub use engine::RemoteConfigEngine;
pub use fetch::{ConnectionOptions, FetchResponse, RemoteFetcher};
pub use outcome::{FetchFuture, FetchStatus};
pub use persist::{ConfigStorage, FileStorage, StorageError};
pub use store::{
    ConfigInfo, ConfigSetting, FetchFailureReason, LastFetchStatus, LayeredConfig,
    NamespacedConfigData, DEFAULT_NAMESPACE,
};
pub use value::{ValueInfo, ValueSource};
