//! Abstraction for waiting between attempts
//!
//! Production code blocks the calling thread; tests swap in sleepers that return at once.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Performs the wait between two attempts.
pub trait Sleeper: Send + Sync + std::fmt::Debug {
    fn sleep(&self, duration: Duration);
}

/// Production sleeper: blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Test sleeper that doesn't actually sleep
#[derive(Debug, Default, Clone, Copy)]
pub struct InstantSleeper;

impl Sleeper for InstantSleeper {
    fn sleep(&self, _duration: Duration) {}
}

/// Test sleeper that records every requested wait without sleeping.
#[derive(Debug, Clone, Default)]
pub struct TrackingSleeper {
    calls: Arc<Mutex<Vec<Duration>>>,
}

impl TrackingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Duration>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.guard().clone()
    }

    pub fn call_at(&self, idx: usize) -> Option<Duration> {
        self.guard().get(idx).copied()
    }

    /// Sum of all recorded waits.
    pub fn total(&self) -> Duration {
        self.guard().iter().sum()
    }

    pub fn clear(&self) {
        self.guard().clear();
    }
}

impl Sleeper for TrackingSleeper {
    fn sleep(&self, duration: Duration) {
        self.guard().push(duration);
    }
}
