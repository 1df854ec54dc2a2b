//! Clock abstraction for guildwatch.
//!
//! Every window and timer in the detection engine reads time through the
//! [`Clock`] trait so that tests can drive it deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds in one second.
pub const MS_PER_SEC: u64 = 1_000;

/// Milliseconds in one minute.
pub const MS_PER_MIN: u64 = 60 * MS_PER_SEC;

/// Milliseconds in one hour.
pub const MS_PER_HOUR: u64 = 60 * MS_PER_MIN;

/// Milliseconds in one day.
pub const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// Trait for getting the current Unix time.
pub trait Clock: Send + Sync {
    /// Returns the current time as Unix milliseconds since epoch.
    fn now_unix_ms(&self) -> u64;
}

/// Real system clock implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Mock clock for testing.
///
/// Starts at a fixed timestamp and only moves when told to.
#[derive(Debug, Default)]
pub struct MockClock {
    timestamp: AtomicU64,
}

impl MockClock {
    /// Create a mock clock with a fixed timestamp.
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp_ms),
        }
    }

    /// Jump to an absolute timestamp. Never moves backwards.
    pub fn set(&self, timestamp_ms: u64) {
        self.timestamp.fetch_max(timestamp_ms, Ordering::SeqCst);
    }

    /// Move the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.timestamp.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now_unix_ms(&self) -> u64 {
        self.timestamp.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_unix_ms(&self) -> u64 {
        (**self).now_unix_ms()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_unix_ms(&self) -> u64 {
        (**self).now_unix_ms()
    }
}
