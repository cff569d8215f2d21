//! Background sweep.
//!
//! Reaping on every capacity check only runs while visitors are active. The
//! sweeper reclaims abandoned holds on a timer as well, and drops sessions
//! nobody has touched for a while.

use crate::lease::{ReapReport, Reaper};
use crate::session::SessionRegistry;
use bay_booking_core::environment::Clock;
use bay_booking_core::store::StoreError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Outcome of one sweep.
#[derive(Debug)]
pub struct SweepOutcome {
    /// The reap pass, or why it could not list holds.
    pub reap: Result<ReapReport, StoreError>,
    /// Sessions evicted.
    pub evicted: usize,
}

/// Periodic reaper and session janitor.
#[derive(Clone)]
pub struct Sweeper {
    reaper: Reaper,
    registry: SessionRegistry,
    clock: Arc<dyn Clock>,
    interval: Duration,
    session_idle: chrono::Duration,
}

impl Sweeper {
    /// Create a sweeper running every `interval`.
    #[must_use]
    pub fn new(
        reaper: Reaper,
        registry: SessionRegistry,
        clock: Arc<dyn Clock>,
        interval: Duration,
        session_idle: chrono::Duration,
    ) -> Self {
        Self {
            reaper,
            registry,
            clock,
            interval,
            session_idle,
        }
    }

    /// Run one sweep now.
    pub async fn sweep_once(&self) -> SweepOutcome {
        let now = self.clock.now();
        let reap = self.reaper.reap(now).await;
        match &reap {
            Ok(report) if report.deleted_count() > 0 || !report.failures.is_empty() => {
                tracing::info!(
                    deleted = report.deleted_count(),
                    failures = report.failures.len(),
                    "Sweep reaped stale holds"
                );
            },
            Ok(_) => {},
            Err(error) => tracing::warn!(%error, "Sweep could not list holds"),
        }

        let evicted = self.registry.evict_idle(now, self.session_idle).await;
        SweepOutcome { reap, evicted }
    }

    /// Sweep every interval until `shutdown` flips to `true` (or its sender
    /// is dropped).
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_secs = self.interval.as_secs(), "Sweeper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::challenge::OpenGate;
    use crate::lease::{BookingFinalizer, CapacityChecker, EmailPolicy, LockStrategy, acquirer_for};
    use crate::notify::LogNotifier;
    use crate::session::SessionEnvironment;
    use crate::window::WindowGate;
    use bay_booking_core::store::ReservationStore;
    use bay_booking_testing::{InMemoryReservationStore, ManualClock, test_clock};
    use chrono::{NaiveDate, NaiveTime};

    fn sweeper() -> (Sweeper, ManualClock, Arc<InMemoryReservationStore>) {
        let clock = ManualClock::new(test_clock().now());
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let store = Arc::new(InMemoryReservationStore::new(shared_clock.clone()));
        let dyn_store: Arc<dyn ReservationStore> = store.clone();

        let reaper = Reaper::new(dyn_store.clone(), Duration::from_secs(60));
        let capacity = CapacityChecker::new(dyn_store.clone(), reaper.clone(), 5);
        let env = SessionEnvironment {
            clock: shared_clock.clone(),
            window: WindowGate::new(
                chrono_tz::Tz::UTC,
                NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
                Vec::new(),
            ),
            acquirer: acquirer_for(LockStrategy::SlotClaim, dyn_store.clone(), capacity.clone(), reaper.clone()),
            capacity,
            finalizer: BookingFinalizer::new(dyn_store, EmailPolicy::new(["maca"])),
            reaper: reaper.clone(),
            notifier: Arc::new(LogNotifier),
            challenge: Arc::new(OpenGate),
        };
        let registry = SessionRegistry::new(env, Duration::from_secs(5));
        let sweeper = Sweeper::new(
            reaper,
            registry,
            shared_clock,
            Duration::from_millis(10),
            chrono::Duration::hours(1),
        );
        (sweeper, clock, store)
    }

    #[tokio::test]
    async fn sweep_reaps_abandoned_holds_without_traffic() {
        let (sweeper, clock, store) = sweeper();
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        store.seed_temporary(date, clock.now() - chrono::Duration::seconds(61));
        store.seed_temporary(date, clock.now() - chrono::Duration::seconds(30));

        let outcome = sweeper.sweep_once().await;
        let report = outcome.reap.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted_count(), 1);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn sweep_evicts_idle_sessions() {
        let (sweeper, clock, _store) = sweeper();
        sweeper.registry.create().await;
        clock.advance(chrono::Duration::hours(2));

        let outcome = sweeper.sweep_once().await;
        assert_eq!(outcome.evicted, 1);
        assert!(sweeper.registry.is_empty().await);
    }

    #[tokio::test]
    async fn spawned_sweeper_stops_on_shutdown() {
        let (sweeper, clock, store) = sweeper();
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        store.seed_temporary(date, clock.now() - chrono::Duration::seconds(120));

        let (tx, rx) = watch::channel(false);
        let task = sweeper.spawn(rx);

        // The first tick fires immediately.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.records().is_empty());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
