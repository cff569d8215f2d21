//! Lock acquirers: turn a free bay into a temporary hold for one session.
//!
//! Two strategies share the [`LockAcquirer`] seam:
//!
//! - [`CheckThenInsert`] reaps, counts, compares, then inserts. The count
//!   and the insert are separate store calls, so two sessions that both read
//!   "one free" will both insert.
//! - [`SlotClaim`] reaps, then asks the store to claim the lowest free slot
//!   number in one atomic operation. There are only `total_bays` slot numbers
//!   per date, and rows without a slot number (seeded, or left by
//!   check-then-insert) count against the same total, so the table can never
//!   hold more rows than bays.

use super::capacity::CapacityChecker;
use super::reaper::Reaper;
use crate::metrics::{self, HoldOutcome};
use bay_booking_core::bay::{BayRecord, LockHandle};
use bay_booking_core::store::{ReservationStore, StoreError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Why a hold was not taken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// Every bay on `date` is occupied.
    #[error("No bays free on {date}")]
    BaysFull {
        /// The requested date.
        date: NaiveDate,
    },

    /// The store failed; no row was written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A hold taken by one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    /// The held row.
    pub handle: LockHandle,
    /// Store-assigned insert time; the lease runs from here.
    pub acquired_at: DateTime<Utc>,
}

impl From<&BayRecord> for Hold {
    fn from(record: &BayRecord) -> Self {
        Self {
            handle: LockHandle::from(record),
            acquired_at: record.created_at,
        }
    }
}

/// Which acquirer a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockStrategy {
    /// Count, then insert. Racy.
    CheckThenInsert,
    /// Atomic unique-slot claim.
    #[default]
    SlotClaim,
}

impl LockStrategy {
    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckThenInsert => "check-then-insert",
            Self::SlotClaim => "slot-claim",
        }
    }
}

impl fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown lock strategy name.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown lock strategy {0:?} (expected check-then-insert or slot-claim)")]
pub struct ParseStrategyError(String);

impl FromStr for LockStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "check-then-insert" => Ok(Self::CheckThenInsert),
            "slot-claim" => Ok(Self::SlotClaim),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}

/// Boxed future returned by [`LockAcquirer::acquire`].
pub type AcquireFuture<'a> = Pin<Box<dyn Future<Output = Result<Hold, AcquireError>> + Send + 'a>>;

/// Converts available capacity into a hold.
pub trait LockAcquirer: Send + Sync {
    /// The strategy implemented.
    fn strategy(&self) -> LockStrategy;

    /// Reap stale holds, then try to take one bay on `date`.
    ///
    /// # Errors
    ///
    /// [`AcquireError::BaysFull`] when nothing is free, [`AcquireError::Store`]
    /// when the store fails.
    fn acquire(&self, date: NaiveDate, now: DateTime<Utc>) -> AcquireFuture<'_>;
}

/// Build the acquirer for `strategy`.
#[must_use]
pub fn acquirer_for(
    strategy: LockStrategy,
    store: Arc<dyn ReservationStore>,
    capacity: CapacityChecker,
    reaper: Reaper,
) -> Arc<dyn LockAcquirer> {
    match strategy {
        LockStrategy::CheckThenInsert => Arc::new(CheckThenInsert::new(store, capacity)),
        LockStrategy::SlotClaim => Arc::new(SlotClaim::new(store, reaper, capacity.total_bays())),
    }
}

fn record_outcome<T>(result: &Result<T, AcquireError>) {
    metrics::record_hold(match result {
        Ok(_) => HoldOutcome::Acquired,
        Err(AcquireError::BaysFull { .. }) => HoldOutcome::Full,
        Err(AcquireError::Store(_)) => HoldOutcome::Error,
    });
}

/// Read occupancy, compare, insert.
#[derive(Clone)]
pub struct CheckThenInsert {
    store: Arc<dyn ReservationStore>,
    capacity: CapacityChecker,
}

impl CheckThenInsert {
    /// Create the acquirer.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, capacity: CapacityChecker) -> Self {
        Self { store, capacity }
    }

    #[tracing::instrument(skip(self), fields(record_id))]
    async fn try_acquire(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<Hold, AcquireError> {
        let availability = self.capacity.check(date, now).await?;
        if !availability.has_free_bay() {
            return Err(AcquireError::BaysFull { date });
        }

        // Another session may insert between the count above and this insert.
        let record = self.store.insert_temporary(date).await?;
        tracing::Span::current().record("record_id", record.id.value());
        tracing::debug!(occupied = availability.occupied, "Hold inserted");
        Ok(Hold::from(&record))
    }
}

impl LockAcquirer for CheckThenInsert {
    fn strategy(&self) -> LockStrategy {
        LockStrategy::CheckThenInsert
    }

    fn acquire(&self, date: NaiveDate, now: DateTime<Utc>) -> AcquireFuture<'_> {
        Box::pin(async move {
            let result = self.try_acquire(date, now).await;
            record_outcome(&result);
            result
        })
    }
}

/// Claim a numbered slot atomically.
#[derive(Clone)]
pub struct SlotClaim {
    store: Arc<dyn ReservationStore>,
    reaper: Reaper,
    total_bays: u16,
}

impl SlotClaim {
    /// Create the acquirer.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, reaper: Reaper, total_bays: u16) -> Self {
        Self {
            store,
            reaper,
            total_bays,
        }
    }

    #[tracing::instrument(skip(self), fields(record_id, slot))]
    async fn try_acquire(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<Hold, AcquireError> {
        self.reaper.reap(now).await?;

        let record = self
            .store
            .claim_slot(date, self.total_bays)
            .await?
            .ok_or(AcquireError::BaysFull { date })?;

        let span = tracing::Span::current();
        span.record("record_id", record.id.value());
        if let Some(slot) = record.slot {
            span.record("slot", slot);
        }
        Ok(Hold::from(&record))
    }
}

impl LockAcquirer for SlotClaim {
    fn strategy(&self) -> LockStrategy {
        LockStrategy::SlotClaim
    }

    fn acquire(&self, date: NaiveDate, now: DateTime<Utc>) -> AcquireFuture<'_> {
        Box::pin(async move {
            let result = self.try_acquire(date, now).await;
            record_outcome(&result);
            result
        })
    }
}
