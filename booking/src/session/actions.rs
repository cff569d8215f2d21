//! Session actions: visitor commands plus the results effects feed back.

use super::types::SessionError;
use crate::lease::{Availability, BookingForm, Hold};
use bay_booking_core::bay::{Identity, LockHandle};

/// Everything a [`SessionReducer`](super::SessionReducer) reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    // Commands
    /// Answer the challenge question.
    Verify {
        /// The visitor's answer.
        answer: String,
    },
    /// Reap, then count free bays for the target date.
    CheckAvailability,
    /// Try to take a hold.
    RequestBay,
    /// Re-evaluate the lease countdown.
    Tick,
    /// Submit the booking form.
    Finalize {
        /// Submitted details.
        form: BookingForm,
    },
    /// Start over after an expiry or rejection.
    Restart,

    // Feedback
    /// Capacity snapshot loaded.
    AvailabilityLoaded {
        /// The snapshot.
        availability: Availability,
    },
    /// A hold was taken.
    LockAcquired {
        /// The hold.
        hold: Hold,
    },
    /// No hold was taken.
    LockRejected {
        /// Why.
        error: SessionError,
    },
    /// The held row is now a confirmed booking.
    BookingConfirmed {
        /// The confirmed row.
        handle: LockHandle,
        /// Who booked.
        identity: Identity,
    },
    /// The confirm call failed.
    FinalizeFailed {
        /// Why.
        error: SessionError,
    },
    /// A store read failed outside of acquire/confirm.
    StoreFailed {
        /// Store error text.
        error: String,
    },
    /// The reap after an expiry finished.
    ExpiredReaped {
        /// Rows deleted by that pass.
        deleted: usize,
    },
}

impl SessionAction {
    /// Whether this action comes from the visitor rather than an effect.
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::Verify { .. }
                | Self::CheckAvailability
                | Self::RequestBay
                | Self::Tick
                | Self::Finalize { .. }
                | Self::Restart
        )
    }

    /// Short name used in logs and transition errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Verify { .. } => "verify",
            Self::CheckAvailability => "check availability",
            Self::RequestBay => "request a bay",
            Self::Tick => "tick",
            Self::Finalize { .. } => "finalize",
            Self::Restart => "restart",
            Self::AvailabilityLoaded { .. } => "availability_loaded",
            Self::LockAcquired { .. } => "lock_acquired",
            Self::LockRejected { .. } => "lock_rejected",
            Self::BookingConfirmed { .. } => "booking_confirmed",
            Self::FinalizeFailed { .. } => "finalize_failed",
            Self::StoreFailed { .. } => "store_failed",
            Self::ExpiredReaped { .. } => "expired_reaped",
        }
    }
}
