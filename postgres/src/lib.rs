//! `PostgreSQL` reservation store for visitor bay booking.
//!
//! Implements [`ReservationStore`] over a single `bay_records` table using
//! sqlx. Supports:
//!
//! - The naive insert used by the check-then-insert lock strategy
//! - An atomic lowest-free-slot claim guarded by `UNIQUE (date, slot)`
//! - Conditional promotion of temporary rows (`WHERE status = 'temporary'`)
//! - Connection pooling and an embedded, idempotent schema migration
//!
//! # Example
//!
//! ```no_run
//! use bay_booking_postgres::PostgresReservationStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgresReservationStore::new("postgres://localhost/bays").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use bay_booking_core::bay::{BayRecord, Identity, RecordId, RecordStatus, TemporaryRow};
use bay_booking_core::store::{ReservationStore, StoreError, StoreFuture};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

/// Schema for the reservation table.
///
/// `slot` stays `NULL` for rows inserted without a slot claim; Postgres
/// treats NULLs as distinct under `UNIQUE`, so only claimed slots collide.
pub const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS bay_records (
        id            BIGSERIAL PRIMARY KEY,
        date          DATE        NOT NULL,
        slot          SMALLINT,
        status        TEXT        NOT NULL CHECK (status IN ('temporary', 'confirmed')),
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        first_name    TEXT,
        surname       TEXT,
        email         TEXT,
        mobile        TEXT,
        registration  TEXT,
        UNIQUE (date, slot)
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_bay_records_date ON bay_records(date)",
    "CREATE INDEX IF NOT EXISTS idx_bay_records_temporary ON bay_records(created_at) WHERE status = 'temporary'",
];

const RECORD_COLUMNS: &str =
    "id, date, slot, status, created_at, first_name, surname, email, mobile, registration";

/// Pool settings for [`PostgresReservationStore::connect`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// Time allowed to acquire a connection.
    pub connect_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// `PostgreSQL`-backed [`ReservationStore`].
#[derive(Clone)]
pub struct PostgresReservationStore {
    pool: PgPool,
}

impl PostgresReservationStore {
    /// Connect with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::connect(database_url, &PoolSettings::default()).await
    }

    /// Connect with explicit pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str, settings: &PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(
            max_connections = settings.max_connections,
            "Connected to reservation database"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the table and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Query`] if a statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(query_error)?;
        }
        tracing::debug!("Reservation schema ready");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn claim_lowest_free_slot(
        &self,
        date: NaiveDate,
        total_bays: u16,
    ) -> Result<Option<BayRecord>, StoreError> {
        let sql = format!(
            r"
            INSERT INTO bay_records (date, slot, status)
            SELECT $1, s.slot, 'temporary'
            FROM generate_series(1, $2::int) AS s(slot)
            WHERE NOT EXISTS (
                SELECT 1 FROM bay_records b WHERE b.date = $1 AND b.slot = s.slot
            )
            AND (SELECT COUNT(*) FROM bay_records c WHERE c.date = $1) < $2::int
            ORDER BY s.slot
            LIMIT 1
            ON CONFLICT (date, slot) DO NOTHING
            RETURNING {RECORD_COLUMNS}
            "
        );

        // A conflict means another session took the slot between our
        // NOT EXISTS probe and the insert; probe again. Each lost race means
        // one more slot is taken, so `total_bays` rounds always settle.
        for attempt in 0..=total_bays {
            let row = sqlx::query(&sql)
                .bind(date)
                .bind(i32::from(total_bays))
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;

            if let Some(row) = row {
                let record = record_from_row(&row)?;
                tracing::debug!(record_id = %record.id, slot = ?record.slot, attempt, "Slot claimed");
                return Ok(Some(record));
            }

            let free: i64 = sqlx::query_scalar(
                r"
                SELECT LEAST(
                    (SELECT COUNT(*) FROM generate_series(1, $2::int) AS s(slot)
                     WHERE NOT EXISTS (
                         SELECT 1 FROM bay_records b WHERE b.date = $1 AND b.slot = s.slot
                     )),
                    $2::int - (SELECT COUNT(*) FROM bay_records c WHERE c.date = $1)
                )
                ",
            )
            .bind(date)
            .bind(i32::from(total_bays))
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;

            if free <= 0 {
                return Ok(None);
            }
            metrics::counter!("store.claim_slot.conflicts").increment(1);
        }

        Ok(None)
    }
}

fn query_error(error: sqlx::Error) -> StoreError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            StoreError::Unavailable(error.to_string())
        },
        other => StoreError::Query(other.to_string()),
    }
}

fn corrupt(error: &sqlx::Error) -> StoreError {
    StoreError::Corrupt(error.to_string())
}

fn record_from_row(row: &PgRow) -> Result<BayRecord, StoreError> {
    let status: String = row.try_get("status").map_err(|e| corrupt(&e))?;
    let status = status
        .parse::<RecordStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let slot: Option<i16> = row.try_get("slot").map_err(|e| corrupt(&e))?;
    let slot = slot
        .map(u16::try_from)
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("negative slot: {e}")))?;

    let identity = match status {
        RecordStatus::Temporary => None,
        RecordStatus::Confirmed => Some(Identity {
            first_name: text(row, "first_name")?,
            surname: text(row, "surname")?,
            email: text(row, "email")?,
            mobile: text(row, "mobile")?,
            registration: text(row, "registration")?,
        }),
    };

    Ok(BayRecord {
        id: RecordId::new(row.try_get("id").map_err(|e| corrupt(&e))?),
        date: row.try_get("date").map_err(|e| corrupt(&e))?,
        slot,
        status,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| corrupt(&e))?,
        identity,
    })
}

fn text(row: &PgRow, column: &str) -> Result<String, StoreError> {
    let value: Option<String> = row.try_get(column).map_err(|e| corrupt(&e))?;
    value.ok_or_else(|| StoreError::Corrupt(format!("confirmed row without {column}")))
}

impl ReservationStore for PostgresReservationStore {
    fn select_by_date(&self, date: NaiveDate) -> StoreFuture<'_, Vec<BayRecord>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {RECORD_COLUMNS} FROM bay_records WHERE date = $1 ORDER BY id"
            ))
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

            rows.iter().map(record_from_row).collect()
        })
    }

    fn select_temporary(&self) -> StoreFuture<'_, Vec<TemporaryRow>> {
        Box::pin(async move {
            // created_at is handed back as naive UTC text; the reaper owns parsing.
            let rows: Vec<(i64, String)> = sqlx::query_as(
                r"
                SELECT id, to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS.US')
                FROM bay_records
                WHERE status = 'temporary'
                ORDER BY id
                ",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(query_error)?;

            Ok(rows
                .into_iter()
                .map(|(id, created_at)| TemporaryRow {
                    id: RecordId::new(id),
                    created_at,
                })
                .collect())
        })
    }

    fn insert_temporary(&self, date: NaiveDate) -> StoreFuture<'_, BayRecord> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "INSERT INTO bay_records (date, status) VALUES ($1, 'temporary') RETURNING {RECORD_COLUMNS}"
            ))
            .bind(date)
            .fetch_one(&self.pool)
            .await
            .map_err(query_error)?;

            record_from_row(&row)
        })
    }

    fn claim_slot(&self, date: NaiveDate, total_bays: u16) -> StoreFuture<'_, Option<BayRecord>> {
        Box::pin(self.claim_lowest_free_slot(date, total_bays))
    }

    fn confirm(&self, id: RecordId, identity: Identity) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE bay_records
                SET status = 'confirmed',
                    first_name = $2, surname = $3, email = $4, mobile = $5, registration = $6
                WHERE id = $1 AND status = 'temporary'
                ",
            )
            .bind(id.value())
            .bind(&identity.first_name)
            .bind(&identity.surname)
            .bind(&identity.email)
            .bind(&identity.mobile)
            .bind(&identity.registration)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;

            Ok(result.rows_affected() == 1)
        })
    }

    fn delete(&self, id: RecordId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM bay_records WHERE id = $1 AND status = 'temporary'")
                .bind(id.value())
                .execute(&self.pool)
                .await
                .map_err(query_error)?;

            Ok(result.rows_affected() == 1)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(query_error)?;
            Ok(())
        })
    }
}
