//! Nullable clock: the `now` handed to every time-gated engine call.
//!
//! The engine never reads wall time itself, so tests and script replay
//! drive voting windows by moving this clock.

use ciphervote_types::Timestamp;
use std::cell::Cell;

pub struct NullClock {
    now: Cell<Timestamp>,
}

impl NullClock {
    pub fn new(start_secs: u64) -> Self {
        Self {
            now: Cell::new(Timestamp::new(start_secs)),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.now.get()
    }

    /// Move forward by `secs`, e.g. past a proposal's end.
    pub fn advance(&self, secs: u64) {
        self.now.set(self.now.get().plus_secs(secs));
    }

    /// Jump to an absolute time. Going backwards is allowed.
    pub fn set(&self, secs: u64) {
        self.now.set(Timestamp::new(secs));
    }
}
