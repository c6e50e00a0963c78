//! Coalescing signal channel
//!
//! A single-consumer wake-up primitive of depth 1: any number of `raise`
//! calls between two `next` calls collapse into one pending signal, which
//! bounds the work a slow consumer accumulates. Closing the channel is the
//! only termination signal a worker ever sees.

use std::sync::{Condvar, Mutex, PoisonError};

#[derive(Debug, Default)]
struct State {
    pending: bool,
    closed: bool,
}

/// Blocking, closeable signal channel shared between one producer side and
/// one consumer loop.
#[derive(Debug, Default)]
pub struct SignalChannel {
    state: Mutex<State>,
    wakeup: Condvar,
}

impl SignalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark work pending and wake the consumer. Signals raised while one is
    /// already pending coalesce; raising on a closed channel is a no-op.
    pub fn raise(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return;
        }
        state.pending = true;
        self.wakeup.notify_one();
    }

    /// Block until a signal is pending or the channel is closed.
    ///
    /// Returns true after consuming a pending signal, false once the channel
    /// is closed — the consumer loop's exit condition. Close wins over a
    /// pending signal: work that was signalled but never started is
    /// cancelled, not executed.
    pub fn next(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while !state.pending && !state.closed {
            state = self
                .wakeup
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.closed {
            false
        } else {
            state.pending = false;
            true
        }
    }

    /// Close the channel. Any signal still pending is discarded; the
    /// consumer's next `next` call returns false.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        self.wakeup.notify_all();
    }
}
