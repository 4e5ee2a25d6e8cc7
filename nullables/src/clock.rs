//! A clock that only moves when a test moves it.

use std::sync::atomic::{AtomicU64, Ordering};

use synth_types::{Clock, Timestamp};

#[derive(Debug, Default)]
pub struct NullClock {
    secs: AtomicU64,
}

impl NullClock {
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to `secs`, e.g. just before a grace period or CCB window ends.
    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}
