//! `TimeService` collaborator (§6).
//!
//! The container never calls `SystemTime::now()` directly — every `now`
//! sample in `get`/`compute`/iteration comes from an injected `TimeService`.
//! This is what lets §8 scenario 2 ("advance the clock by 1 hour") be a plain
//! unit test instead of a real sleep.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the container's notion of "now", in milliseconds. Monotonicity is
/// preferred but not required (§6).
pub trait TimeService: Send + Sync {
    /// Current wall-clock time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// Default `TimeService` backed by the system clock.
#[derive(Debug, Default)]
pub struct SystemTimeService;

impl TimeService for SystemTimeService {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A `TimeService` a test can advance explicitly, used throughout this
/// crate's expiry tests instead of sleeping real time.
#[derive(Debug, Default)]
pub struct FakeTimeService {
    millis: AtomicU64,
}

impl FakeTimeService {
    /// Creates a fake clock starting at `start_millis`.
    pub fn new(start_millis: u64) -> Self {
        FakeTimeService {
            millis: AtomicU64::new(start_millis),
        }
    }

    /// Advances the clock by `delta_millis` and returns the new value.
    pub fn advance(&self, delta_millis: u64) -> u64 {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst) + delta_millis
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeService for FakeTimeService {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
