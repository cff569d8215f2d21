//! The reservation locking protocol.
//!
//! ```text
//! reap stale holds -> count occupancy -> take a hold -> confirm | expire
//! ```
//!
//! Every piece talks to the shared table through
//! [`ReservationStore`](bay_booking_core::store::ReservationStore); nothing
//! here keeps state between calls.

pub mod acquire;
pub mod capacity;
pub mod finalize;
pub mod reaper;

pub use acquire::{AcquireError, CheckThenInsert, Hold, LockAcquirer, LockStrategy, SlotClaim, acquirer_for};
pub use capacity::{Availability, CapacityChecker};
pub use finalize::{
    BookingFinalizer, BookingForm, EmailPolicy, Field, FieldIssue, FinalizeError, ValidationError,
    confirmation_message,
};
pub use reaper::{ReapFailure, ReapReport, Reaper, TimestampParseError, parse_created_at};
