//! In-memory reservation table.
//!
//! Behaves like the Postgres store (each operation atomic, `claim_slot`
//! race-free, `created_at` assigned by the store) and adds hooks tests need:
//! injected failures, raw rows with arbitrary timestamp text, and a barrier
//! that parks concurrent `select_by_date` callers so a check-then-insert race
//! can be forced deterministically.

use bay_booking_core::bay::{BayRecord, Identity, RecordId, RecordStatus, TemporaryRow};
use bay_booking_core::environment::Clock;
use bay_booking_core::store::{ReservationStore, StoreError, StoreFuture};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Barrier;

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    /// `select_by_date`
    SelectByDate,
    /// `select_temporary`
    SelectTemporary,
    /// `insert_temporary`
    Insert,
    /// `claim_slot`
    ClaimSlot,
    /// `confirm`
    Confirm,
    /// `delete`
    Delete,
    /// `ping`
    Ping,
}

#[derive(Debug, Clone)]
struct StoredRow {
    record: BayRecord,
    /// Overrides the rendered `created_at` text seen by `select_temporary`.
    raw_created_at: Option<String>,
}

#[derive(Default)]
struct Tables {
    next_id: i64,
    rows: BTreeMap<i64, StoredRow>,
}

#[derive(Default)]
struct Faults {
    fail_next: HashMap<StoreOp, usize>,
    failing_deletes: HashSet<RecordId>,
    calls: HashMap<StoreOp, usize>,
}

struct SelectGate {
    barrier: Arc<Barrier>,
    remaining: usize,
}

/// In-memory [`ReservationStore`] for tests.
///
/// # Example
///
/// ```
/// use bay_booking_testing::{InMemoryReservationStore, test_clock};
/// use bay_booking_core::store::ReservationStore;
/// use chrono::NaiveDate;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let store = InMemoryReservationStore::new(Arc::new(test_clock()));
/// let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
/// let held = store.claim_slot(date, 1).await.unwrap();
/// assert!(held.is_some());
/// assert!(store.claim_slot(date, 1).await.unwrap().is_none());
/// # });
/// ```
pub struct InMemoryReservationStore {
    clock: Arc<dyn Clock>,
    tables: Mutex<Tables>,
    faults: Mutex<Faults>,
    select_gate: Mutex<Option<SelectGate>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Render a timestamp the way Postgres renders `created_at AT TIME ZONE 'UTC'`.
fn render_naive_utc(at: DateTime<Utc>) -> String {
    at.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

impl InMemoryReservationStore {
    /// Create an empty table whose `created_at` values come from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tables: Mutex::new(Tables::default()),
            faults: Mutex::new(Faults::default()),
            select_gate: Mutex::new(None),
        }
    }

    /// Make the next `times` calls of `op` fail with [`StoreError::Unavailable`].
    pub fn fail_next(&self, op: StoreOp, times: usize) {
        *lock(&self.faults).fail_next.entry(op).or_default() += times;
    }

    /// Make every delete of `id` fail until cleared.
    pub fn fail_deletes_of(&self, id: RecordId) {
        lock(&self.faults).failing_deletes.insert(id);
    }

    /// How many times `op` has been called (including failed calls).
    #[must_use]
    pub fn calls(&self, op: StoreOp) -> usize {
        lock(&self.faults).calls.get(&op).copied().unwrap_or(0)
    }

    /// Park the next `parties` calls to `select_by_date` after they have read
    /// the table, releasing them together once all have arrived.
    ///
    /// Used to interleave two sessions between their capacity read and their
    /// insert.
    pub fn interleave_selects(&self, parties: usize) {
        *lock(&self.select_gate) = Some(SelectGate {
            barrier: Arc::new(Barrier::new(parties)),
            remaining: parties,
        });
    }

    /// Seed a confirmed booking.
    pub fn seed_confirmed(&self, date: NaiveDate, identity: Identity) -> BayRecord {
        let created_at = self.clock.now();
        self.push(date, None, RecordStatus::Confirmed, created_at, Some(identity), None)
    }

    /// Seed a temporary hold created at `created_at`.
    pub fn seed_temporary(&self, date: NaiveDate, created_at: DateTime<Utc>) -> BayRecord {
        self.push(date, None, RecordStatus::Temporary, created_at, None, None)
    }

    /// Seed a temporary hold whose `created_at` is reported as `raw` text.
    pub fn seed_raw_temporary(&self, date: NaiveDate, raw: impl Into<String>) -> BayRecord {
        let created_at = self.clock.now();
        self.push(date, None, RecordStatus::Temporary, created_at, None, Some(raw.into()))
    }

    /// Snapshot of every row, ordered by id.
    #[must_use]
    pub fn records(&self) -> Vec<BayRecord> {
        lock(&self.tables).rows.values().map(|row| row.record.clone()).collect()
    }

    /// A single row by id.
    #[must_use]
    pub fn record(&self, id: RecordId) -> Option<BayRecord> {
        lock(&self.tables).rows.get(&id.value()).map(|row| row.record.clone())
    }

    /// Number of rows with `status` on `date`.
    #[must_use]
    pub fn count(&self, date: NaiveDate, status: RecordStatus) -> usize {
        lock(&self.tables)
            .rows
            .values()
            .filter(|row| row.record.date == date && row.record.status == status)
            .count()
    }

    fn push(
        &self,
        date: NaiveDate,
        slot: Option<u16>,
        status: RecordStatus,
        created_at: DateTime<Utc>,
        identity: Option<Identity>,
        raw_created_at: Option<String>,
    ) -> BayRecord {
        let mut tables = lock(&self.tables);
        Self::push_locked(&mut tables, date, slot, status, created_at, identity, raw_created_at)
    }

    fn push_locked(
        tables: &mut Tables,
        date: NaiveDate,
        slot: Option<u16>,
        status: RecordStatus,
        created_at: DateTime<Utc>,
        identity: Option<Identity>,
        raw_created_at: Option<String>,
    ) -> BayRecord {
        tables.next_id += 1;
        let record = BayRecord {
            id: RecordId::new(tables.next_id),
            date,
            slot,
            status,
            created_at,
            identity,
        };
        tables.rows.insert(
            tables.next_id,
            StoredRow {
                record: record.clone(),
                raw_created_at,
            },
        );
        record
    }

    /// Record a call and consume an injected failure, if any.
    fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        let mut faults = lock(&self.faults);
        *faults.calls.entry(op).or_default() += 1;
        match faults.fail_next.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unavailable(format!("injected {op:?} failure")))
            },
            _ => Ok(()),
        }
    }

    fn take_select_barrier(&self) -> Option<Arc<Barrier>> {
        let mut gate = lock(&self.select_gate);
        let current = gate.as_mut()?;
        let barrier = Arc::clone(&current.barrier);
        current.remaining -= 1;
        if current.remaining == 0 {
            *gate = None;
        }
        Some(barrier)
    }
}

impl ReservationStore for InMemoryReservationStore {
    fn select_by_date(&self, date: NaiveDate) -> StoreFuture<'_, Vec<BayRecord>> {
        Box::pin(async move {
            self.enter(StoreOp::SelectByDate)?;
            let rows: Vec<BayRecord> = lock(&self.tables)
                .rows
                .values()
                .filter(|row| row.record.date == date)
                .map(|row| row.record.clone())
                .collect();

            if let Some(barrier) = self.take_select_barrier() {
                barrier.wait().await;
            }
            Ok(rows)
        })
    }

    fn select_temporary(&self) -> StoreFuture<'_, Vec<TemporaryRow>> {
        Box::pin(async move {
            self.enter(StoreOp::SelectTemporary)?;
            Ok(lock(&self.tables)
                .rows
                .values()
                .filter(|row| row.record.is_temporary())
                .map(|row| TemporaryRow {
                    id: row.record.id,
                    created_at: row
                        .raw_created_at
                        .clone()
                        .unwrap_or_else(|| render_naive_utc(row.record.created_at)),
                })
                .collect())
        })
    }

    fn insert_temporary(&self, date: NaiveDate) -> StoreFuture<'_, BayRecord> {
        Box::pin(async move {
            self.enter(StoreOp::Insert)?;
            let created_at = self.clock.now();
            Ok(self.push(date, None, RecordStatus::Temporary, created_at, None, None))
        })
    }

    fn claim_slot(&self, date: NaiveDate, total_bays: u16) -> StoreFuture<'_, Option<BayRecord>> {
        Box::pin(async move {
            self.enter(StoreOp::ClaimSlot)?;
            let created_at = self.clock.now();
            let mut tables = lock(&self.tables);

            let on_date: Vec<&BayRecord> = tables
                .rows
                .values()
                .map(|row| &row.record)
                .filter(|record| record.date == date)
                .collect();
            if on_date.len() >= usize::from(total_bays) {
                return Ok(None);
            }
            let taken: HashSet<u16> = on_date.iter().filter_map(|record| record.slot).collect();

            let Some(slot) = (1..=total_bays).find(|slot| !taken.contains(slot)) else {
                return Ok(None);
            };

            Ok(Some(Self::push_locked(
                &mut tables,
                date,
                Some(slot),
                RecordStatus::Temporary,
                created_at,
                None,
                None,
            )))
        })
    }

    fn confirm(&self, id: RecordId, identity: Identity) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.enter(StoreOp::Confirm)?;
            let mut tables = lock(&self.tables);
            match tables.rows.get_mut(&id.value()) {
                Some(row) if row.record.is_temporary() => {
                    row.record.status = RecordStatus::Confirmed;
                    row.record.identity = Some(identity);
                    Ok(true)
                },
                _ => Ok(false),
            }
        })
    }

    fn delete(&self, id: RecordId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.enter(StoreOp::Delete)?;
            if lock(&self.faults).failing_deletes.contains(&id) {
                return Err(StoreError::Query(format!("delete of {id} refused")));
            }
            let mut tables = lock(&self.tables);
            let temporary = tables
                .rows
                .get(&id.value())
                .is_some_and(|row| row.record.is_temporary());
            Ok(temporary && tables.rows.remove(&id.value()).is_some())
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.enter(StoreOp::Ping) })
    }
}
