//! Dependencies injected into the session reducer.

use crate::lease::{BookingFinalizer, CapacityChecker, LockAcquirer, Reaper};
use crate::window::WindowGate;
use bay_booking_core::challenge::ChallengeGate;
use bay_booking_core::environment::Clock;
use bay_booking_core::notify::Notifier;
use std::sync::Arc;

/// Everything a session needs from the outside world.
///
/// Cloned into each per-request `Store`; all members are cheap handles.
#[derive(Clone)]
pub struct SessionEnvironment {
    /// Time source for the window gate and lease countdown.
    pub clock: Arc<dyn Clock>,
    /// Booking window.
    pub window: WindowGate,
    /// Reap-then-count capacity reads.
    pub capacity: CapacityChecker,
    /// Hold acquisition strategy.
    pub acquirer: Arc<dyn LockAcquirer>,
    /// Validation and confirmation.
    pub finalizer: BookingFinalizer,
    /// Stale-hold reaper; also defines the lease length.
    pub reaper: Reaper,
    /// Confirmation announcements.
    pub notifier: Arc<dyn Notifier>,
    /// Gate in front of [`RequestBay`](super::SessionAction::RequestBay).
    pub challenge: Arc<dyn ChallengeGate>,
}

impl SessionEnvironment {
    /// How long a hold lives.
    #[must_use]
    pub const fn lock_duration(&self) -> chrono::Duration {
        self.reaper.lock_duration()
    }
}
