//! Stale-hold reaper.
//!
//! Deletes every temporary record whose `created_at` is at or before
//! `now - lock_duration`. A record whose timestamp cannot be parsed, or whose
//! delete fails, is reported and skipped; it never stops the pass.

use crate::metrics;
use bay_booking_core::bay::{RecordId, TemporaryRow};
use bay_booking_core::store::{ReservationStore, StoreError};
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use std::sync::Arc;
use thiserror::Error;

/// A `created_at` value the reaper could not interpret.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unparseable created_at {raw:?} on record {record_id}")]
pub struct TimestampParseError {
    /// The affected row.
    pub record_id: RecordId,
    /// The text as stored.
    pub raw: String,
}

/// One record the reaper had to skip.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReapFailure {
    /// `created_at` did not parse.
    #[error(transparent)]
    Timestamp(#[from] TimestampParseError),

    /// The record was stale but the delete failed.
    #[error("Failed to delete stale hold {record_id}: {error}")]
    Delete {
        /// The affected row.
        record_id: RecordId,
        /// What the store reported.
        error: StoreError,
    },
}

/// Outcome of one reap pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Temporary records examined.
    pub scanned: usize,
    /// Stale records removed.
    pub deleted: Vec<RecordId>,
    /// Records skipped because of a failure.
    pub failures: Vec<ReapFailure>,
}

impl ReapReport {
    /// Number of rows removed.
    #[must_use]
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }
}

/// Parse a stored `created_at`.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` followed by a `+HH`, `+HHMM`
/// or `+HH:MM` offset, and naive `YYYY-MM-DD[T ]HH:MM:SS[.f]`, which is read
/// as UTC.
#[must_use]
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Some((naive_part, offset)) = split_offset(raw) {
        let naive = parse_naive(naive_part)?;
        return offset
            .from_local_datetime(&naive)
            .single()
            .map(|at| at.with_timezone(&Utc));
    }

    parse_naive(raw).map(|naive| naive.and_utc())
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Split a trailing `+HH`, `+HHMM` or `+HH:MM` (or `-`) offset.
fn split_offset(raw: &str) -> Option<(&str, FixedOffset)> {
    // The date part has dashes at 4 and 7; an offset sign can only follow the time.
    let position = raw.rfind(['+', '-']).filter(|&at| at > 10)?;
    let (naive_part, suffix) = raw.split_at(position);
    let sign = if suffix.starts_with('-') { -1 } else { 1 };

    let digits: String = match suffix[1..].split_once(':') {
        Some((hours, minutes)) if hours.len() == 2 && minutes.len() == 2 => {
            format!("{hours}{minutes}")
        },
        Some(_) => return None,
        None => suffix[1..].to_string(),
    };
    if !(digits.len() == 2 || digits.len() == 4) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = if digits.len() == 4 { digits[2..].parse().ok()? } else { 0 };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).map(|offset| (naive_part, offset))
}

/// Removes holds that outlived their lease.
#[derive(Clone)]
pub struct Reaper {
    store: Arc<dyn ReservationStore>,
    lock_duration: chrono::Duration,
}

impl Reaper {
    /// Create a reaper for holds lasting `lock_duration`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, lock_duration: std::time::Duration) -> Self {
        Self {
            store,
            lock_duration: chrono::Duration::from_std(lock_duration)
                .unwrap_or(chrono::Duration::MAX),
        }
    }

    /// How long a hold lives.
    #[must_use]
    pub const fn lock_duration(&self) -> chrono::Duration {
        self.lock_duration
    }

    /// Whether a hold created at `created_at` is dead at `now`.
    #[must_use]
    pub fn is_stale(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(created_at) >= self.lock_duration
    }

    /// Delete every stale temporary record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the temporary rows cannot be listed.
    /// Per-record failures are collected in the report.
    #[tracing::instrument(skip(self), fields(deleted))]
    pub async fn reap(&self, now: DateTime<Utc>) -> Result<ReapReport, StoreError> {
        let rows = self.store.select_temporary().await?;
        let mut report = ReapReport {
            scanned: rows.len(),
            ..ReapReport::default()
        };

        for TemporaryRow { id, created_at } in rows {
            let Some(created) = parse_created_at(&created_at) else {
                tracing::warn!(record_id = %id, raw = %created_at, "Skipping hold with unparseable created_at");
                report.failures.push(
                    TimestampParseError {
                        record_id: id,
                        raw: created_at,
                    }
                    .into(),
                );
                continue;
            };

            if !self.is_stale(created, now) {
                continue;
            }

            match self.store.delete(id).await {
                Ok(true) => report.deleted.push(id),
                // Reaped by another session, or confirmed in the meantime.
                Ok(false) => {},
                Err(error) => {
                    tracing::warn!(record_id = %id, %error, "Failed to delete stale hold");
                    report.failures.push(ReapFailure::Delete { record_id: id, error });
                },
            }
        }

        tracing::Span::current().record("deleted", report.deleted_count());
        metrics::record_reap(&report);
        Ok(report)
    }
}
