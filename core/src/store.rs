//! The shared reservation table.
//!
//! Every session coordinates exclusively through a [`ReservationStore`]: there
//! is no in-process lock shared between sessions. Each operation is atomic in
//! isolation and nothing more, so any multi-step protocol built on top of it
//! (count then insert, for example) can interleave with other sessions.
//!
//! # Implementations
//!
//! - `PostgresReservationStore` (in `bay-booking-postgres`): production
//! - `InMemoryReservationStore` (in `bay-booking-testing`): deterministic tests
//!   with fault and interleaving injection

use crate::bay::{BayRecord, Identity, RecordId, TemporaryRow};
use chrono::NaiveDate;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors raised by a reservation store.
///
/// All variants are transient from the caller's perspective: nothing was
/// partially written, and the operation may be retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connection refused, pool exhausted, timeout).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but rejected or failed the query.
    #[error("Query failed: {0}")]
    Query(String),

    /// A row came back in a shape that cannot be mapped to the domain.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

/// The persisted table of bay records.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so stores can be shared as
/// `Arc<dyn ReservationStore>` and captured by effects.
pub trait ReservationStore: Send + Sync {
    /// Every record (temporary and confirmed) occupying capacity on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the select fails.
    fn select_by_date(&self, date: NaiveDate) -> StoreFuture<'_, Vec<BayRecord>>;

    /// Every temporary record, for any date, with its raw insert timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the select fails.
    fn select_temporary(&self) -> StoreFuture<'_, Vec<TemporaryRow>>;

    /// Insert one temporary record for `date` without any capacity check.
    ///
    /// The store assigns `id` and `created_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the insert fails. No row is left behind.
    fn insert_temporary(&self, date: NaiveDate) -> StoreFuture<'_, BayRecord>;

    /// Atomically insert a temporary record into the lowest free slot in
    /// `1..=total_bays` for `date`.
    ///
    /// Returns `None` when every slot is taken, or when the date already holds
    /// `total_bays` rows of any kind (rows without a slot count too). Two
    /// concurrent calls can never obtain the same slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails.
    fn claim_slot(&self, date: NaiveDate, total_bays: u16) -> StoreFuture<'_, Option<BayRecord>>;

    /// Promote record `id` to confirmed with `identity`, only if it is still
    /// temporary.
    ///
    /// Returns `false` when no temporary row with that id exists (already
    /// confirmed, or reaped).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the update fails.
    fn confirm(&self, id: RecordId, identity: Identity) -> StoreFuture<'_, bool>;

    /// Delete record `id` if it is still temporary. Returns whether a row
    /// was removed; confirmed bookings are never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    fn delete(&self, id: RecordId) -> StoreFuture<'_, bool>;

    /// Cheap connectivity probe for readiness checks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    fn ping(&self) -> StoreFuture<'_, ()>;
}
