//! Bay reservation domain types.
//!
//! A [`BayRecord`] is one row in the shared reservation table: it occupies one
//! unit of capacity for one booking date. Records start out
//! [`RecordStatus::Temporary`] (a hold taken by a session) and are either
//! promoted to [`RecordStatus::Confirmed`] or physically deleted by the reaper.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Store-assigned identifier of a bay record.
///
/// # Examples
///
/// ```
/// use bay_booking_core::bay::RecordId;
///
/// let id = RecordId::new(42);
/// assert_eq!(id.value(), 42);
/// assert_eq!(id.to_string(), "42");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(i64);

impl RecordId {
    /// Wrap a raw store identifier.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Error returned when a stored status string is not recognised.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid record status: {0}")]
pub struct ParseStatusError(String);

/// Lifecycle status of a bay record.
///
/// Stored explicitly in its own column; identity values never double as a
/// status marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// A hold pending form completion. Eligible for reaping once stale.
    Temporary,
    /// A completed booking. Terminal.
    Confirmed,
}

impl RecordStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Temporary => "temporary",
            Self::Confirmed => "confirmed",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temporary" => Ok(Self::Temporary),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visitor identity attached to a confirmed booking.
///
/// Values are stored already trimmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub surname: String,
    /// Contact email.
    pub email: String,
    /// Contact phone number.
    pub mobile: String,
    /// Vehicle registration plate.
    pub registration: String,
}

/// One row of the reservation table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BayRecord {
    /// Store-assigned id.
    pub id: RecordId,
    /// Booking date this record occupies capacity for.
    pub date: NaiveDate,
    /// Slot number `1..=total_bays` for slot-claimed holds, `None` otherwise.
    pub slot: Option<u16>,
    /// Current status.
    pub status: RecordStatus,
    /// Store-assigned insert time (UTC).
    pub created_at: DateTime<Utc>,
    /// `None` while temporary.
    pub identity: Option<Identity>,
}

impl BayRecord {
    /// Whether this record is a hold that has not been promoted.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.status == RecordStatus::Temporary
    }
}

/// A temporary row as returned for reaping.
///
/// `created_at` is left as the raw text the store produced so that legacy or
/// foreign rows with malformed timestamps can be isolated per record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemporaryRow {
    /// Row id.
    pub id: RecordId,
    /// Raw insert timestamp text.
    pub created_at: String,
}

/// Proof that a session took a hold: the temporary row it inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockHandle {
    /// The held row.
    pub record_id: RecordId,
    /// Booking date the hold is for.
    pub date: NaiveDate,
    /// Claimed slot, if the slot-claim strategy took the hold.
    pub slot: Option<u16>,
}

impl From<&BayRecord> for LockHandle {
    fn from(record: &BayRecord) -> Self {
        Self {
            record_id: record.id,
            date: record.date,
            slot: record.slot,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn status_round_trips_through_column_text() {
        for status in [RecordStatus::Temporary, RecordStatus::Confirmed] {
            assert_eq!(status.as_str().parse::<RecordStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = "TEMP".parse::<RecordStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid record status: TEMP");
    }

    #[test]
    fn visitor_named_temp_is_still_confirmed() {
        let record = BayRecord {
            id: RecordId::new(1),
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            slot: None,
            status: RecordStatus::Confirmed,
            created_at: Utc::now(),
            identity: Some(Identity {
                first_name: "TEMP".into(),
                surname: "TEMP".into(),
                email: "TEMP@maca.com.au".into(),
                mobile: "TEMP".into(),
                registration: "TEMP".into(),
            }),
        };
        assert!(!record.is_temporary());
    }

    #[test]
    fn handle_copies_row_coordinates() {
        let record = BayRecord {
            id: RecordId::new(7),
            date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
            slot: Some(3),
            status: RecordStatus::Temporary,
            created_at: Utc::now(),
            identity: None,
        };
        let handle = LockHandle::from(&record);
        assert_eq!(handle.record_id, RecordId::new(7));
        assert_eq!(handle.slot, Some(3));
        assert_eq!(handle.date, record.date);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&RecordStatus::Temporary).unwrap();
        assert_eq!(json, "\"temporary\"");
    }
}
