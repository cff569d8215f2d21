//! End-to-end properties of the reservation protocol.
//!
//! Each test drives the assembled application (registry, lease pieces and the
//! in-memory table) rather than a single component.
//!
//! Run with: `cargo test -p visitor-bays --test booking_properties_test`

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use bay_booking_core::bay::RecordStatus;
use bay_booking_core::environment::Clock;
use bay_booking_core::store::ReservationStore;
use bay_booking_testing::helpers::sample_identity;
use bay_booking_testing::properties::any_booking_date;
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Weekday};
use common::{LOCK_SECS, booking_date, config, spawn_app, valid_form};
use proptest::prelude::*;
use std::sync::Arc;
use visitor_bays::lease::{
    AcquireError, Availability, CapacityChecker, CheckThenInsert, LockAcquirer, Reaper, SlotClaim,
};
use visitor_bays::session::{SessionAction, SessionError, SessionPhase};

fn lock_duration() -> std::time::Duration {
    std::time::Duration::from_secs(60)
}

// ============================================================================
// Capacity
// ============================================================================

#[tokio::test]
async fn over_subscribed_date_shows_zero_available() {
    let t = spawn_app(&[("BOOKING_TOTAL_BAYS", "2")]);
    for _ in 0..3 {
        t.store.seed_confirmed(booking_date(), sample_identity());
    }

    let store: Arc<dyn ReservationStore> = t.store.clone();
    let reaper = Reaper::new(store.clone(), lock_duration());
    let availability = CapacityChecker::new(store, reaper, 2)
        .check(booking_date(), t.clock.now())
        .await
        .unwrap();

    assert_eq!(availability.occupied, 3);
    assert_eq!(availability.available, 0);
    assert_eq!(availability.raw_available(), -1);
    assert!(!availability.has_free_bay());
}

proptest! {
    #[test]
    fn available_is_never_negative(total in 0u16..50, extra in 0usize..50) {
        let occupied = usize::from(total) + extra;
        let availability = Availability::from_occupancy(booking_date(), total, occupied);
        prop_assert_eq!(availability.available, 0);
    }
}

// ============================================================================
// Reaping
// ============================================================================

#[tokio::test]
async fn reap_deletes_only_holds_past_the_lease() {
    let t = spawn_app(&[]);
    let now = t.clock.now();
    let stale = t
        .store
        .seed_temporary(booking_date(), now - Duration::seconds(LOCK_SECS + 1));
    let fresh = t
        .store
        .seed_temporary(booking_date(), now - Duration::seconds(LOCK_SECS - 1));

    let store: Arc<dyn ReservationStore> = t.store.clone();
    let report = Reaper::new(store, lock_duration()).reap(now).await.unwrap();

    assert_eq!(report.scanned, 2);
    assert_eq!(report.deleted, vec![stale.id]);
    assert!(t.store.record(stale.id).is_none());
    assert!(t.store.record(fresh.id).is_some());
}

// ============================================================================
// Finalize
// ============================================================================

#[tokio::test]
async fn finalize_twice_confirms_once_and_notifies_once() {
    let t = spawn_app(&[]);
    let registry = t.app.registry();
    let id = registry.create().await.id;

    registry.dispatch(id, SessionAction::CheckAvailability).await.unwrap();
    registry.dispatch(id, SessionAction::RequestBay).await.unwrap();

    for _ in 0..2 {
        let state = registry
            .dispatch(id, SessionAction::Finalize { form: valid_form() })
            .await
            .unwrap();
        assert!(state.last_error.is_none());
        assert!(state.confirmed);
    }

    assert_eq!(t.store.count(booking_date(), RecordStatus::Confirmed), 1);
    assert_eq!(t.store.count(booking_date(), RecordStatus::Temporary), 0);
    assert!(t.notifier.wait_for(1, std::time::Duration::from_secs(2)).await);
    assert!(t.notifier.messages()[0].contains("**Name**: Jordan Lee"));
}

#[tokio::test]
async fn invalid_finalize_leaves_hold_and_lease_untouched() {
    let t = spawn_app(&[]);
    let registry = t.app.registry();
    let id = registry.create().await.id;

    registry.dispatch(id, SessionAction::CheckAvailability).await.unwrap();
    let held = registry.dispatch(id, SessionAction::RequestBay).await.unwrap();
    let SessionPhase::Locked { handle, locked_at, .. } = held.phase else {
        panic!("expected a hold, got {:?}", held.phase);
    };
    let row_before = t.store.record(handle.record_id).unwrap();

    t.clock.advance(Duration::seconds(10));
    let form = visitor_bays::lease::BookingForm {
        mobile: String::new(),
        ..valid_form()
    };
    let state = registry.dispatch(id, SessionAction::Finalize { form }).await.unwrap();

    assert!(matches!(state.last_error, Some(SessionError::Validation(_))));
    let SessionPhase::Locked { locked_at: after, .. } = state.phase else {
        panic!("expected the hold to survive, got {:?}", state.phase);
    };
    assert_eq!(after, locked_at);
    assert_eq!(t.store.record(handle.record_id).unwrap(), row_before);
    assert_eq!(
        state
            .view(t.clock.now(), Duration::seconds(LOCK_SECS))
            .remaining_seconds,
        Some(LOCK_SECS - 10)
    );
    assert_eq!(t.notifier.count(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn check_then_insert_can_overbook_when_interleaved() {
    let t = spawn_app(&[]);
    let store: Arc<dyn ReservationStore> = t.store.clone();
    let reaper = Reaper::new(store.clone(), lock_duration());
    let acquirer = CheckThenInsert::new(store.clone(), CapacityChecker::new(store, reaper, 1));
    let now = t.clock.now();

    // Both sessions read zero rows before either inserts.
    t.store.interleave_selects(2);
    let (a, b) = tokio::join!(
        acquirer.acquire(booking_date(), now),
        acquirer.acquire(booking_date(), now)
    );

    assert!(a.is_ok());
    assert!(b.is_ok());
    assert_eq!(t.store.count(booking_date(), RecordStatus::Temporary), 2);
}

#[tokio::test]
async fn slot_claim_never_overbooks_when_interleaved() {
    let t = spawn_app(&[]);
    let store: Arc<dyn ReservationStore> = t.store.clone();
    let reaper = Reaper::new(store.clone(), lock_duration());
    let acquirer = SlotClaim::new(store, reaper, 1);
    let now = t.clock.now();

    let (a, b) = tokio::join!(
        acquirer.acquire(booking_date(), now),
        acquirer.acquire(booking_date(), now)
    );

    let held = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(held, 1);
    assert!(
        [a, b]
            .into_iter()
            .any(|r| matches!(r, Err(AcquireError::BaysFull { date }) if date == booking_date()))
    );
    assert_eq!(t.store.count(booking_date(), RecordStatus::Temporary), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slot_claim_hands_out_each_bay_once_across_threads() {
    let t = spawn_app(&[]);
    let store: Arc<dyn ReservationStore> = t.store.clone();
    let reaper = Reaper::new(store.clone(), lock_duration());
    let acquirer: Arc<dyn LockAcquirer> = Arc::new(SlotClaim::new(store, reaper, 3));
    let now = t.clock.now();

    let attempts: Vec<_> = (0..12)
        .map(|_| {
            let acquirer = Arc::clone(&acquirer);
            tokio::spawn(async move { acquirer.acquire(booking_date(), now).await })
        })
        .collect();

    let mut slots = Vec::new();
    for attempt in attempts {
        if let Ok(hold) = attempt.await.unwrap() {
            slots.push(hold.handle.slot.unwrap());
        }
    }
    slots.sort_unstable();

    assert_eq!(slots, vec![1, 2, 3]);
    assert_eq!(t.store.count(booking_date(), RecordStatus::Temporary), 3);
}

// ============================================================================
// Full flows
// ============================================================================

#[tokio::test]
async fn second_session_sees_the_first_booking() {
    let t = spawn_app(&[("BOOKING_TOTAL_BAYS", "2")]);
    let registry = t.app.registry();

    let a = registry.create().await.id;
    let state = registry.dispatch(a, SessionAction::CheckAvailability).await.unwrap();
    let SessionPhase::AvailabilityShown { availability, .. } = state.phase else {
        panic!("expected availability, got {:?}", state.phase);
    };
    assert_eq!(availability.available, 2);

    let state = registry.dispatch(a, SessionAction::RequestBay).await.unwrap();
    let SessionPhase::Locked { handle, .. } = state.phase else {
        panic!("expected a hold, got {:?}", state.phase);
    };
    assert_eq!(t.store.record(handle.record_id).unwrap().status, RecordStatus::Temporary);

    let state = registry
        .dispatch(a, SessionAction::Finalize { form: valid_form() })
        .await
        .unwrap();
    assert!(matches!(state.phase, SessionPhase::Confirmed { .. }));
    assert_eq!(t.store.record(handle.record_id).unwrap().status, RecordStatus::Confirmed);

    let b = registry.create().await.id;
    let state = registry.dispatch(b, SessionAction::CheckAvailability).await.unwrap();
    let SessionPhase::AvailabilityShown { availability, .. } = state.phase else {
        panic!("expected availability, got {:?}", state.phase);
    };
    assert_eq!(availability.available, 1);
    assert_eq!(availability.occupied, 1);
}

#[tokio::test]
async fn unfinished_hold_expires_and_is_reaped() {
    let t = spawn_app(&[]);
    let registry = t.app.registry();
    let id = registry.create().await.id;

    registry.dispatch(id, SessionAction::CheckAvailability).await.unwrap();
    registry.dispatch(id, SessionAction::RequestBay).await.unwrap();
    assert_eq!(t.store.count(booking_date(), RecordStatus::Temporary), 1);

    t.clock.advance(Duration::seconds(LOCK_SECS + 1));
    let state = registry.dispatch(id, SessionAction::Tick).await.unwrap();

    assert_eq!(state.phase, SessionPhase::Expired);
    assert_eq!(state.last_error, Some(SessionError::ExpiredLease));
    assert!(t.store.records().is_empty());

    let state = registry.dispatch(id, SessionAction::Restart).await.unwrap();
    assert_eq!(state.phase, SessionPhase::Idle);
}

#[tokio::test]
async fn sweeper_reaps_abandoned_holds() {
    let t = spawn_app(&[]);
    let registry = t.app.registry();
    let id = registry.create().await.id;

    registry.dispatch(id, SessionAction::CheckAvailability).await.unwrap();
    registry.dispatch(id, SessionAction::RequestBay).await.unwrap();

    t.clock.advance(Duration::seconds(LOCK_SECS));
    let outcome = t.app.sweeper().sweep_once().await;

    assert_eq!(outcome.reap.unwrap().deleted_count(), 1);
    assert!(t.store.records().is_empty());
}

// ============================================================================
// Window
// ============================================================================

fn shanghai_gate() -> visitor_bays::WindowGate {
    config(&[
        ("BOOKING_TIMEZONE", "Asia/Shanghai"),
        ("BOOKING_START", "16:00"),
        ("BOOKING_END", "08:30"),
        ("BOOKING_EXCLUDED_WEEKDAYS", "Mon"),
    ])
    .window_gate()
    .unwrap()
}

fn shanghai(date: NaiveDate, h: u32, m: u32) -> chrono::DateTime<chrono::Utc> {
    chrono_tz::Asia::Shanghai
        .from_local_datetime(&date.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap()))
        .single()
        .unwrap()
        .with_timezone(&chrono::Utc)
}

#[test]
fn window_excludes_bookings_for_monday() {
    let gate = shanghai_gate();
    let sunday = NaiveDate::from_ymd_opt(2025, 1, 5).unwrap();
    let monday = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();

    let for_tuesday = gate.evaluate(shanghai(monday, 23, 0));
    assert!(for_tuesday.open);
    assert_eq!(for_tuesday.booking_date.weekday(), Weekday::Tue);

    let for_monday = gate.evaluate(shanghai(sunday, 23, 0));
    assert!(!for_monday.open);
    assert_eq!(for_monday.booking_date, monday);
}

proptest! {
    #[test]
    fn window_closed_at_noon(date in any_booking_date()) {
        prop_assert!(!shanghai_gate().is_open(shanghai(date, 12, 0)));
    }
}

#[tokio::test]
async fn closed_window_refuses_a_hold() {
    let t = spawn_app(&[("BOOKING_START", "16:00"), ("BOOKING_END", "08:30")]);
    t.clock.set(chrono::Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());
    let registry = t.app.registry();
    let id = registry.create().await.id;

    let state = registry.dispatch(id, SessionAction::CheckAvailability).await.unwrap();

    assert_eq!(state.last_error, Some(SessionError::BookingClosed));
    assert_eq!(state.phase, SessionPhase::Idle);
    assert!(t.store.records().is_empty());
}
