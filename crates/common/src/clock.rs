//! Injectable wall clock.
//!
//! Token expiry, key-set refresh intervals and claim checks all read time
//! through [`Clock`] so that components can be driven by a fake clock in
//! tests. Production code uses [`SystemClock`].

use std::fmt;

/// Source of the current Unix time in seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current Unix timestamp (seconds since epoch).
    fn now_unix(&self) -> i64;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-utils"))]
mod manual {
    use super::Clock;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    /// Clock that only moves when told to.
    ///
    /// **Note**: This is only for testing.
    #[derive(Debug)]
    pub struct ManualClock {
        now: AtomicI64,
    }

    impl ManualClock {
        /// Create a clock frozen at `now` (Unix seconds).
        #[must_use]
        pub fn new(now: i64) -> Self {
            Self {
                now: AtomicI64::new(now),
            }
        }

        /// Move the clock forward.
        pub fn advance(&self, by: Duration) {
            #[allow(clippy::cast_possible_wrap)]
            let secs = by.as_secs() as i64;
            self.now.fetch_add(secs, Ordering::SeqCst);
        }

        /// Jump to an absolute timestamp.
        pub fn set(&self, now: i64) {
            self.now.store(now, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_unix(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_clock_is_close_to_chrono() {
        let now = chrono::Utc::now().timestamp();
        let clock_now = SystemClock.now_unix();
        assert!((clock_now - now).abs() <= 1);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_unix(), 1_000);

        clock.advance(Duration::from_secs(3601));
        assert_eq!(clock.now_unix(), 4_601);

        clock.set(10);
        assert_eq!(clock.now_unix(), 10);
    }
}
