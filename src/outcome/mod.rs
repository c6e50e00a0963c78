//! Async fetch outcomes
//!
//! `fetch` is non-blocking for the caller: eligibility is decided under the
//! store lock, the network work happens on the fetch worker, and the result
//! comes back through a shared handle. The registry keeps the most recently
//! dispatched handle so an ineligible `fetch` call (already in flight, or
//! cache still fresh) piggybacks on the existing outcome instead of
//! allocating a new one.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Observable state of a dispatched fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Not resolved yet. Also reported by the registry's initial handle
    /// before any fetch has ever been dispatched.
    Pending,
    /// The fetch completed and the store's last-fetch status is success.
    Success,
    /// The fetch completed with a failure status.
    Failure,
}

/// Shared outcome slot, resolved exactly once by the fetch worker.
#[derive(Debug)]
pub struct FetchHandle {
    status: Mutex<FetchStatus>,
    resolved: Condvar,
}

impl FetchHandle {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(FetchStatus::Pending),
            resolved: Condvar::new(),
        })
    }

    /// Resolve the handle. A second resolution is ignored.
    pub fn complete(&self, outcome: FetchStatus) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if *status == FetchStatus::Pending {
            *status = outcome;
            self.resolved.notify_all();
        }
    }

    /// Current status without blocking.
    pub fn status(&self) -> FetchStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until resolved.
    pub fn wait(&self) -> FetchStatus {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        while *status == FetchStatus::Pending {
            status = self
                .resolved
                .wait(status)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *status
    }

    /// Block until resolved or `timeout` elapses. `None` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<FetchStatus> {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = std::time::Instant::now() + timeout;
        while *status == FetchStatus::Pending {
            let remaining = deadline.checked_duration_since(std::time::Instant::now())?;
            let (guard, result) = self
                .resolved
                .wait_timeout(status, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            status = guard;
            if result.timed_out() && *status == FetchStatus::Pending {
                return None;
            }
        }
        Some(*status)
    }
}

/// Caller-facing clone of a fetch outcome. Cheap to clone and to hand
/// across threads.
#[derive(Debug, Clone)]
pub struct FetchFuture {
    handle: Arc<FetchHandle>,
}

impl FetchFuture {
    /// Current status without blocking.
    pub fn status(&self) -> FetchStatus {
        self.handle.status()
    }

    /// Block until the fetch resolves.
    ///
    /// The handle returned before any fetch was ever dispatched stays
    /// `Pending` forever; poll with [`status`](Self::status) or bound the
    /// wait with [`wait_timeout`](Self::wait_timeout) when that matters.
    pub fn wait(&self) -> FetchStatus {
        self.handle.wait()
    }

    /// Block until resolved or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<FetchStatus> {
        self.handle.wait_timeout(timeout)
    }
}

/// Registry of the most recently dispatched fetch outcome.
#[derive(Debug)]
pub struct OutcomeRegistry {
    last: Mutex<Arc<FetchHandle>>,
}

impl OutcomeRegistry {
    /// New registry whose initial handle is a never-dispatched `Pending`.
    pub fn new() -> Self {
        Self {
            last: Mutex::new(FetchHandle::new()),
        }
    }

    /// Allocate a fresh pending handle for a newly dispatched fetch and
    /// make it the registry's last result.
    pub fn allocate(&self) -> Arc<FetchHandle> {
        let handle = FetchHandle::new();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        *last = Arc::clone(&handle);
        handle
    }

    /// Caller view of the most recently dispatched fetch.
    pub fn last(&self) -> FetchFuture {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        FetchFuture {
            handle: Arc::clone(&last),
        }
    }
}

impl Default for OutcomeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
