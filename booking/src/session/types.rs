//! Session lock state.

use crate::lease::{Availability, ValidationError};
use bay_booking_core::bay::LockHandle;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Identifies one visitor's booking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Where a session is in the booking flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Nothing checked yet.
    Idle,
    /// A capacity snapshot was shown; no hold taken.
    AvailabilityShown {
        /// Date the snapshot is for.
        date: NaiveDate,
        /// The snapshot.
        availability: Availability,
    },
    /// Holding a temporary row.
    Locked {
        /// The held row.
        handle: LockHandle,
        /// Date being booked.
        date: NaiveDate,
        /// When the lease started.
        locked_at: DateTime<Utc>,
    },
    /// The lease ran out before confirmation.
    Expired,
    /// Booking confirmed.
    Confirmed {
        /// The confirmed row.
        handle: LockHandle,
        /// Date booked.
        date: NaiveDate,
    },
}

impl SessionPhase {
    /// Short name used in views and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AvailabilityShown { .. } => "availability_shown",
            Self::Locked { .. } => "locked",
            Self::Expired => "expired",
            Self::Confirmed { .. } => "confirmed",
        }
    }
}

/// A failure shown to the visitor. Every variant leaves the session in a
/// state from which availability can be checked again (or, for validation,
/// the form resubmitted).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Outside the booking window, or the target date is excluded.
    #[error("Booking is closed right now")]
    BookingClosed,

    /// The challenge gate has not been passed.
    #[error("Please answer the challenge question first")]
    NotVerified,

    /// No bay was free.
    #[error("All bays for {date} are taken")]
    BaysFull {
        /// The requested date.
        date: NaiveDate,
    },

    /// The countdown reached zero before confirmation.
    #[error("Your hold has expired, please check availability again")]
    ExpiredLease,

    /// The held row was reclaimed before it could be confirmed.
    #[error("Your hold was released, please check availability again")]
    HoldLost,

    /// The form failed validation; the hold is kept.
    #[error(transparent)]
    Validation(ValidationError),

    /// The store failed; retrying is safe.
    #[error("Booking store error: {0}")]
    Store(String),

    /// The command does not apply in the current phase.
    #[error("Cannot {command} while {phase}")]
    InvalidTransition {
        /// Current phase name.
        phase: &'static str,
        /// The refused command.
        command: &'static str,
    },
}

impl SessionError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BookingClosed => "BOOKING_CLOSED",
            Self::NotVerified => "NOT_VERIFIED",
            Self::BaysFull { .. } => "BAYS_FULL",
            Self::ExpiredLease => "LEASE_EXPIRED",
            Self::HoldLost => "HOLD_LOST",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Store(_) => "STORE_UNAVAILABLE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

/// Per-session state, persisted between requests by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Session id.
    pub id: SessionId,
    /// Current phase.
    pub phase: SessionPhase,
    /// Passed the challenge gate.
    pub verified: bool,
    /// A confirm call is running.
    pub finalize_in_flight: bool,
    /// A booking was confirmed; further finalize calls are no-ops.
    pub confirmed: bool,
    /// Failure from the latest command.
    pub last_error: Option<SessionError>,
    /// Time of the latest command.
    pub last_seen: DateTime<Utc>,
}

impl SessionState {
    /// A fresh session.
    #[must_use]
    pub const fn new(id: SessionId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            phase: SessionPhase::Idle,
            verified: false,
            finalize_in_flight: false,
            confirmed: false,
            last_error: None,
            last_seen: now,
        }
    }

    /// Lease time left, if locked: `lock_duration - (now - locked_at)`.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>, lock_duration: chrono::Duration) -> Option<chrono::Duration> {
        match self.phase {
            SessionPhase::Locked { locked_at, .. } => Some(lock_duration - (now - locked_at)),
            _ => None,
        }
    }

    /// Whether the session has been untouched for `idle` at `now`.
    #[must_use]
    pub fn is_idle(&self, now: DateTime<Utc>, idle: chrono::Duration) -> bool {
        now - self.last_seen >= idle
    }

    /// Client-facing snapshot.
    #[must_use]
    pub fn view(&self, now: DateTime<Utc>, lock_duration: chrono::Duration) -> SessionView {
        let (booking_date, availability, slot) = match self.phase {
            SessionPhase::Idle | SessionPhase::Expired => (None, None, None),
            SessionPhase::AvailabilityShown { date, availability } => (Some(date), Some(availability), None),
            SessionPhase::Locked { date, handle, .. } | SessionPhase::Confirmed { date, handle } => {
                (Some(date), None, handle.slot)
            },
        };

        SessionView {
            session_id: self.id,
            phase: self.phase.name().to_string(),
            booking_date,
            availability,
            slot,
            remaining_seconds: self
                .remaining(now, lock_duration)
                .map(|left| left.num_seconds().max(0)),
            verified: self.verified,
            confirmed: self.confirmed,
        }
    }
}

/// Client-facing session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    /// Session id.
    pub session_id: SessionId,
    /// Phase name.
    pub phase: String,
    /// Date being checked, held or booked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_date: Option<NaiveDate>,
    /// Latest capacity snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<Availability>,
    /// Claimed slot number, when the slot-claim strategy took the hold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<u16>,
    /// Countdown while locked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
    /// Passed the challenge gate.
    pub verified: bool,
    /// Booking confirmed.
    pub confirmed: bool,
}
