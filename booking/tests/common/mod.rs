//! Shared setup for the booking integration suites.
//!
//! Builds a [`BookingApp`] around a manual clock, the in-memory table and a
//! recording notifier. The window is open all day in UTC, so at the test
//! clock's start (2025-01-01 00:00 UTC) bookings are for 2025-01-02.

#![allow(dead_code, clippy::unwrap_used)]

use bay_booking_core::challenge::ChallengeGate;
use bay_booking_core::environment::Clock;
use bay_booking_core::store::ReservationStore;
use bay_booking_testing::helpers::init_test_tracing;
use bay_booking_testing::{InMemoryReservationStore, ManualClock, RecordingNotifier, test_clock};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use visitor_bays::challenge::{OpenGate, StaticChallenge};
use visitor_bays::lease::BookingForm;
use visitor_bays::{BookingApp, Config};

pub const LOCK_SECS: i64 = 60;

pub struct TestApp {
    pub app: BookingApp,
    pub clock: ManualClock,
    pub store: Arc<InMemoryReservationStore>,
    pub notifier: RecordingNotifier,
}

/// Configuration for an always-open window, overridden by `pairs`.
pub fn config(pairs: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("STORE_BACKEND", "memory"),
        ("BOOKING_TIMEZONE", "UTC"),
        ("BOOKING_START", "00:00"),
        ("BOOKING_END", "23:59"),
        ("BOOKING_TOTAL_BAYS", "2"),
        ("BOOKING_LOCK_DURATION_SECS", "60"),
        ("BOOKING_EMAIL_MARKERS", "maca,thiess"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in pairs {
        vars.insert((*k).to_string(), (*v).to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned())
}

/// Assemble the app with `pairs` applied on top of [`config`].
pub fn spawn_app(pairs: &[(&str, &str)]) -> TestApp {
    init_test_tracing();

    let config = config(pairs);
    config.validate().unwrap();

    let challenge: Arc<dyn ChallengeGate> = match &config.challenge.answer {
        Some(answer) if config.challenge.enabled => Arc::new(StaticChallenge::new(
            config.challenge.question.clone(),
            answer.clone(),
            config.challenge.bypass_code.clone(),
        )),
        _ => Arc::new(OpenGate),
    };

    let clock = ManualClock::new(test_clock().now());
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(InMemoryReservationStore::new(shared_clock.clone()));
    let dyn_store: Arc<dyn ReservationStore> = store.clone();
    let notifier = RecordingNotifier::new();

    let app = BookingApp::from_parts(config, dyn_store, shared_clock, Arc::new(notifier.clone()), challenge).unwrap();

    TestApp {
        app,
        clock,
        store,
        notifier,
    }
}

/// The date every booking made at the test clock's start is for.
pub fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 2).unwrap()
}

pub fn valid_form() -> BookingForm {
    BookingForm {
        first_name: "Jordan".to_string(),
        surname: "Lee".to_string(),
        email: "jordan.lee@maca.com.au".to_string(),
        mobile: "0400 000 000".to_string(),
        registration: "ABC123".to_string(),
    }
}
