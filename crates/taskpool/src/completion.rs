//! Completion tracking for a fixed set of participants
//!
//! A countdown latch: each participant counts itself out once, and waiters are
//! released when the count reaches zero. Every pool owns its own tracker.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Countdown latch released when every participant has called [`done`](Self::done)
#[derive(Debug)]
pub struct CompletionTracker {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl CompletionTracker {
    /// Create a tracker expecting `count` participants
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        }
    }

    /// Count one participant out
    pub fn done(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.released.notify_all();
        }
    }

    /// Guard that counts one participant out when dropped
    pub fn guard(&self) -> CompletionGuard<'_> {
        CompletionGuard { tracker: self }
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == 0
    }

    /// Block until the count reaches zero
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }

    /// Block until the count reaches zero or `timeout` elapses
    ///
    /// Returns `true` if the count reached zero. A timeout too large to
    /// express as a deadline waits like [`wait`](Self::wait).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self
                .released
                .wait_until(&mut remaining, deadline)
                .timed_out()
            {
                return *remaining == 0;
            }
        }
        true
    }
}

/// Counts its participant out of a [`CompletionTracker`] on drop, including
/// during unwinding.
#[must_use = "dropping the guard immediately counts the participant out"]
pub struct CompletionGuard<'a> {
    tracker: &'a CompletionTracker,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.tracker.done();
    }
}
