//! Wall-clock and mock timestamp sources for stamping blocks and features.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Clock abstraction so blocks and feature vectors can be stamped
/// deterministically in tests.
pub trait TimeProvider: Send + Sync {
    /// Nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> u64;

    /// Microseconds since the Unix epoch.
    fn now_micros(&self) -> u64 {
        self.now_nanos() / 1000
    }
}

/// Production clock backed by the system wall clock.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Manually advanced clock for deterministic tests.
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    /// Creates a mock clock starting at the given nanosecond timestamp.
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    /// Moves the clock forward by `nanos`.
    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Jumps the clock to an absolute nanosecond timestamp.
    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

/// Nanoseconds since the Unix epoch from the system clock.
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Microseconds since the Unix epoch from the system clock.
pub fn current_timestamp_micros() -> u64 {
    current_timestamp_nanos() / 1000
}
