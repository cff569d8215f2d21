//! Test support for the bay booking workspace.
//!
//! Everything here replaces a production collaborator with something a test
//! can steer:
//!
//! - clocks that stand still ([`FixedClock`]) or move on command
//!   ([`ManualClock`])
//! - [`InMemoryReservationStore`], the reservation table in a `Mutex`, with
//!   injected failures and forced read/insert interleavings
//! - notification sinks that record ([`RecordingNotifier`]) or always fail
//! - [`ReducerTest`] for single reducer steps
//! - proptest strategies for dates and times of day
//!
//! ```ignore
//! let clock = ManualClock::new(test_clock().now());
//! let store = InMemoryReservationStore::new(Arc::new(clock.clone()));
//! store.seed_temporary(date, clock.now());
//! clock.advance(chrono::Duration::seconds(61));
//! assert_eq!(reaper.reap(date, clock.now()).await?, 1);
//! ```

use bay_booking_core::environment::Clock;
use chrono::{DateTime, Utc};

mod notifier;
mod reducer_test;
mod reservation_store;

pub use notifier::{FailingNotifier, RecordingNotifier};
pub use reducer_test::{ReducerTest, assertions};
pub use reservation_store::{InMemoryReservationStore, StoreOp};

/// Clocks.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Days from the Unix epoch to 2025-01-01.
    const TEST_EPOCH_DAYS: i64 = 20_089;

    /// A clock stuck at one instant.
    ///
    /// ```
    /// use bay_booking_testing::mocks::FixedClock;
    /// use bay_booking_core::environment::Clock;
    ///
    /// let clock = FixedClock::new(chrono::DateTime::UNIX_EPOCH);
    /// assert_eq!(clock.now(), chrono::DateTime::UNIX_EPOCH);
    /// ```
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock(DateTime<Utc>);

    impl FixedClock {
        /// Stop the clock at `at`.
        #[must_use]
        pub const fn new(at: DateTime<Utc>) -> Self {
            Self(at)
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// A clock tests move by hand.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the store or environment under test.
    ///
    /// ```
    /// use bay_booking_testing::mocks::{ManualClock, test_clock};
    /// use bay_booking_core::environment::Clock;
    ///
    /// let clock = ManualClock::new(test_clock().now());
    /// let start = clock.now();
    /// clock.advance(chrono::Duration::seconds(61));
    /// assert_eq!((clock.now() - start).num_seconds(), 61);
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start the clock at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward (or backward, for a negative delta).
        pub fn advance(&self, delta: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += delta;
        }

        /// Jump to `time`.
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Midnight UTC on 2025-01-01, a Wednesday.
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::UNIX_EPOCH + chrono::Duration::days(TEST_EPOCH_DAYS))
    }
}

/// Shared fixtures.
pub mod helpers {
    use bay_booking_core::bay::Identity;
    use bay_booking_core::effect::Effect;

    /// Install a `tracing` subscriber that writes through the test harness.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    /// A valid visitor identity.
    #[must_use]
    pub fn sample_identity() -> Identity {
        Identity {
            first_name: "Jordan".to_string(),
            surname: "Lee".to_string(),
            email: "jordan.lee@maca.com.au".to_string(),
            mobile: "0400 000 000".to_string(),
            registration: "ABC123".to_string(),
        }
    }

    /// Await each effect in turn and collect the actions they feed back.
    ///
    /// Only one reducer step is resolved: the collected actions are not
    /// reduced, so their own effects never run.
    pub async fn resolve_effects<A>(effects: impl IntoIterator<Item = Effect<A>>) -> Vec<A> {
        let mut feedback = Vec::new();
        for effect in effects {
            if let Effect::Future(fut) = effect {
                feedback.extend(fut.await);
            }
        }
        feedback
    }
}

/// proptest strategies.
pub mod properties {
    use chrono::{NaiveDate, NaiveTime};
    use proptest::prelude::*;

    /// Any minute-precision time of day.
    pub fn any_local_time() -> impl Strategy<Value = NaiveTime> {
        (0u32..24, 0u32..60).prop_filter_map("valid time", |(h, m)| NaiveTime::from_hms_opt(h, m, 0))
    }

    /// Any date in 2024..=2027.
    pub fn any_booking_date() -> impl Strategy<Value = NaiveDate> {
        (2024i32..=2027, 1u32..=366)
            .prop_filter_map("valid ordinal", |(y, d)| NaiveDate::from_yo_opt(y, d))
    }
}

pub use mocks::{FixedClock, ManualClock, test_clock};
