//! Remote fetch collaborator interface
//!
//! The core never talks to the wire itself. It hands a fetcher the app's
//! connection options and a snapshot of the store, blocks the fetch worker
//! (never the store lock) for as long as the fetcher needs, and merges
//! whatever comes back. Failure is a status inside the response, not an
//! error — the fetch worker has no failure path of its own.

use serde::{Deserialize, Serialize};

use crate::store::{ConfigInfo, LayeredConfig, NamespacedConfigData};

/// Connection parameters forwarded verbatim to the fetcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Remote project identifier.
    pub project_id: String,
    /// API key presented to the remote endpoint.
    pub api_key: String,
    /// Installed app identifier.
    pub app_id: String,
}

/// What a fetch attempt produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    /// Replacement for the store's fetched layer, stamped with the fetch
    /// completion time. `None` on failure, leaving the fetched layer as-is.
    pub fetched: Option<NamespacedConfigData>,
    /// Status/time/failure-reason to record in the store's metadata.
    pub info: ConfigInfo,
}

impl FetchResponse {
    /// Successful response carrying a fresh fetched layer.
    pub fn success(fetched: NamespacedConfigData, info: ConfigInfo) -> Self {
        Self {
            fetched: Some(fetched),
            info,
        }
    }

    /// Failed response; only metadata changes.
    pub fn failure(info: ConfigInfo) -> Self {
        Self {
            fetched: None,
            info,
        }
    }
}

/// Wire-level fetch collaborator.
///
/// Implementations may block for arbitrary network latency; the engine
/// guarantees the store lock is not held across this call. The snapshot is
/// the store state at dispatch time (useful for conditional requests
/// against the recorded digests).
pub trait RemoteFetcher: Send + Sync {
    fn fetch(
        &self,
        options: &ConnectionOptions,
        snapshot: &LayeredConfig,
        cache_expiration_seconds: u64,
    ) -> FetchResponse;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_failure_response_carries_no_layer() {
        let response = FetchResponse::failure(ConfigInfo::failure(
            Utc::now(),
            crate::store::FetchFailureReason::Error,
        ));
        assert!(response.fetched.is_none());
    }

    #[test]
    fn test_connection_options_serde() {
        let options = ConnectionOptions {
            project_id: "demo".to_string(),
            api_key: "key".to_string(),
            app_id: "1:demo".to_string(),
        };
        let json = serde_json::to_string(&options).unwrap();
        let parsed: ConnectionOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, options);
    }
}
