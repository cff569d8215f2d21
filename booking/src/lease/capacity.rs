//! Capacity checker.

use super::reaper::Reaper;
use crate::metrics;
use bay_booking_core::store::{ReservationStore, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Bays free on one date.
///
/// Temporary and confirmed records both occupy a bay. A check-then-insert
/// race can push `occupied` past `total`; `available` is clamped at zero
/// while [`raw_available`](Self::raw_available) keeps the signed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    /// The booking date.
    pub date: NaiveDate,
    /// Configured bay count.
    pub total: u16,
    /// Records occupying a bay on `date`.
    pub occupied: usize,
    /// Free bays, never negative.
    pub available: u16,
}

impl Availability {
    /// Compute availability from an occupancy count.
    #[must_use]
    pub fn from_occupancy(date: NaiveDate, total: u16, occupied: usize) -> Self {
        let available = usize::from(total).saturating_sub(occupied);
        Self {
            date,
            total,
            occupied,
            available: u16::try_from(available).unwrap_or(total),
        }
    }

    /// `total - occupied`, negative when over-subscribed.
    #[must_use]
    pub fn raw_available(&self) -> i64 {
        i64::from(self.total) - i64::try_from(self.occupied).unwrap_or(i64::MAX)
    }

    /// Whether at least one bay is free.
    #[must_use]
    pub const fn has_free_bay(&self) -> bool {
        self.available > 0
    }
}

/// Counts occupancy for a date after clearing stale holds.
#[derive(Clone)]
pub struct CapacityChecker {
    store: Arc<dyn ReservationStore>,
    reaper: Reaper,
    total_bays: u16,
}

impl CapacityChecker {
    /// Create a checker over `total_bays`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, reaper: Reaper, total_bays: u16) -> Self {
        Self {
            store,
            reaper,
            total_bays,
        }
    }

    /// Configured bay count.
    #[must_use]
    pub const fn total_bays(&self) -> u16 {
        self.total_bays
    }

    /// Reap stale holds, then count what is left on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the reap pass cannot list holds or the count fails.
    #[tracing::instrument(skip(self), fields(available))]
    pub async fn check(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<Availability, StoreError> {
        self.reaper.reap(now).await?;
        let availability = self.occupancy(date).await?;
        tracing::Span::current().record("available", availability.available);
        Ok(availability)
    }

    /// Count occupancy on `date` without reaping.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the select fails.
    pub async fn occupancy(&self, date: NaiveDate) -> Result<Availability, StoreError> {
        let records = self.store.select_by_date(date).await?;
        let availability = Availability::from_occupancy(date, self.total_bays, records.len());

        if availability.raw_available() < 0 {
            tracing::warn!(
                %date,
                total = availability.total,
                occupied = availability.occupied,
                "Date is over-subscribed"
            );
        }
        metrics::set_available(availability.available);
        Ok(availability)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use bay_booking_core::environment::Clock;
    use bay_booking_testing::helpers::sample_identity;
    use bay_booking_testing::{InMemoryReservationStore, test_clock};
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 7).unwrap()
    }

    #[test]
    fn over_subscription_shows_zero() {
        let availability = Availability::from_occupancy(date(), 1, 2);
        assert_eq!(availability.available, 0);
        assert_eq!(availability.raw_available(), -1);
        assert!(!availability.has_free_bay());
    }

    #[test]
    fn check_reaps_stale_holds_before_counting() {
        let now = test_clock().now();
        let store = Arc::new(InMemoryReservationStore::new(Arc::new(test_clock())));
        store.seed_confirmed(date(), sample_identity());
        store.seed_temporary(date(), now - chrono::Duration::seconds(90));
        store.seed_temporary(date(), now - chrono::Duration::seconds(10));

        let shared: Arc<dyn ReservationStore> = store.clone();
        let reaper = Reaper::new(Arc::clone(&shared), std::time::Duration::from_secs(60));
        let availability = tokio_test::block_on(CapacityChecker::new(shared, reaper, 3).check(date(), now)).unwrap();

        assert_eq!(availability.occupied, 2);
        assert_eq!(availability.available, 1);
        assert_eq!(store.records().len(), 2);
    }

    proptest! {
        #[test]
        fn available_is_clamped(total in 1u16..=10, occupied in 0usize..=40) {
            let availability = Availability::from_occupancy(date(), total, occupied);

            prop_assert!(availability.available <= total);
            prop_assert_eq!(availability.has_free_bay(), occupied < usize::from(total));
            prop_assert_eq!(
                availability.raw_available(),
                i64::from(total) - i64::try_from(occupied).unwrap()
            );
            if occupied >= usize::from(total) {
                prop_assert_eq!(availability.available, 0);
            }
        }
    }
}
