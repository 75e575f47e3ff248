//! Injectable clock abstraction
//!
//! Expiry and rate-limit logic takes time from a [`Clock`] rather than
//! calling `Utc::now()` directly, so both can be tested deterministically.

use std::fmt::Debug;

use chrono::{DateTime, Utc};

/// Monotonic-enough time source for the engine
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub mod test {
    use std::sync::Mutex;

    use chrono::Duration;

    use super::*;

    /// Manually advanced clock for tests
    #[derive(Debug)]
    pub struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                now: Mutex::new(start),
            }
        }

        pub fn advance(&self, delta: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += delta;
        }

        pub fn set(&self, at: DateTime<Utc>) {
            *self.now.lock().unwrap() = at;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(Utc::now());
        let before = clock.now();

        clock.advance(Duration::seconds(90));

        assert_eq!(clock.now() - before, Duration::seconds(90));
    }
}
