//! The session state machine.
//!
//! ```text
//! Idle -> AvailabilityShown -> Locked -> Confirmed
//!                                     \-> Expired
//! ```
//!
//! The lease is checked lazily: every `Tick`, `Finalize` and `RequestBay`
//! first recomputes the countdown and moves an elapsed hold to `Expired`,
//! emitting a reap pass. Store work always happens in effects; the reducer
//! itself never awaits.

use super::actions::SessionAction;
use super::environment::SessionEnvironment;
use super::types::{SessionError, SessionPhase, SessionState};
use crate::lease::{AcquireError, BookingForm, FinalizeError, confirmation_message};
use crate::metrics;
use bay_booking_core::bay::{Identity, LockHandle};
use bay_booking_core::effect::Effect;
use bay_booking_core::reducer::{self, Reducer};
use bay_booking_core::{SmallVec, async_effect, smallvec};
use chrono::{DateTime, Utc};

type Effects = reducer::Effects<SessionAction>;

/// Drives one visitor session through the booking flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionReducer;

impl SessionReducer {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    // ========================================================================
    // Lease
    // ========================================================================

    /// Move an elapsed hold to `Expired`. Returns the reap effect when it did.
    fn expire_if_due(
        state: &mut SessionState,
        env: &SessionEnvironment,
        now: DateTime<Utc>,
    ) -> Option<Effect<SessionAction>> {
        let remaining = state.remaining(now, env.lock_duration())?;
        if remaining > chrono::Duration::zero() {
            return None;
        }

        if let SessionPhase::Locked { handle, .. } = state.phase {
            tracing::info!(
                session_id = %state.id,
                record_id = %handle.record_id,
                "Hold expired before confirmation"
            );
        }
        state.phase = SessionPhase::Expired;
        state.finalize_in_flight = false;
        Some(Self::reap_effect(env, now))
    }

    fn reap_effect(env: &SessionEnvironment, now: DateTime<Utc>) -> Effect<SessionAction> {
        let reaper = env.reaper.clone();
        async_effect! {
            match reaper.reap(now).await {
                Ok(report) => Some(SessionAction::ExpiredReaped {
                    deleted: report.deleted_count(),
                }),
                Err(error) => {
                    tracing::warn!(%error, "Reap after expiry failed");
                    None
                },
            }
        }
    }

    fn invalid(state: &SessionState, action: &SessionAction) -> SessionError {
        Self::refuse(state, action.name())
    }

    fn refuse(state: &SessionState, command: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            phase: state.phase.name(),
            command,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    fn check_availability(state: &mut SessionState, env: &SessionEnvironment, now: DateTime<Utc>) -> Effects {
        // Moving on from an elapsed hold is not an error here.
        let mut effects: Effects = Self::expire_if_due(state, env, now).into_iter().collect();

        let window = env.window.evaluate(now);
        if !window.open {
            state.last_error = Some(SessionError::BookingClosed);
            return effects;
        }

        if matches!(state.phase, SessionPhase::Locked { .. } | SessionPhase::Confirmed { .. }) {
            state.last_error = Some(Self::invalid(state, &SessionAction::CheckAvailability));
            return effects;
        }

        let capacity = env.capacity.clone();
        let date = window.booking_date;
        effects.push(async_effect! {
            match capacity.check(date, now).await {
                Ok(availability) => Some(SessionAction::AvailabilityLoaded { availability }),
                Err(error) => Some(SessionAction::StoreFailed {
                    error: error.to_string(),
                }),
            }
        });
        effects
    }

    fn request_bay(state: &mut SessionState, env: &SessionEnvironment, now: DateTime<Utc>) -> Effects {
        if let Some(reap) = Self::expire_if_due(state, env, now) {
            state.last_error = Some(SessionError::ExpiredLease);
            return smallvec![reap];
        }

        let window = env.window.evaluate(now);
        if !window.open {
            state.last_error = Some(SessionError::BookingClosed);
            return SmallVec::new();
        }

        if !matches!(state.phase, SessionPhase::AvailabilityShown { .. }) {
            state.last_error = Some(Self::invalid(state, &SessionAction::RequestBay));
            return SmallVec::new();
        }

        if env.challenge.is_enabled() && !state.verified {
            state.last_error = Some(SessionError::NotVerified);
            return SmallVec::new();
        }

        let date = window.booking_date;
        // A snapshot already showing no bays for this date ends the same way a
        // rejected claim would, without touching the store.
        let shown_full = matches!(
            &state.phase,
            SessionPhase::AvailabilityShown { availability, .. }
                if availability.date == date && availability.available == 0
        );
        if shown_full {
            tracing::info!(session_id = %state.id, %date, "Hold refused, snapshot shows no free bays");
            state.phase = SessionPhase::Idle;
            state.last_error = Some(SessionError::BaysFull { date });
            return SmallVec::new();
        }

        let acquirer = env.acquirer.clone();
        smallvec![async_effect! {
            match acquirer.acquire(date, now).await {
                Ok(hold) => Some(SessionAction::LockAcquired { hold }),
                Err(AcquireError::BaysFull { date }) => Some(SessionAction::LockRejected {
                    error: SessionError::BaysFull { date },
                }),
                Err(AcquireError::Store(error)) => Some(SessionAction::LockRejected {
                    error: SessionError::Store(error.to_string()),
                }),
            }
        }]
    }

    fn tick(state: &mut SessionState, env: &SessionEnvironment, now: DateTime<Utc>) -> Effects {
        match Self::expire_if_due(state, env, now) {
            Some(reap) => {
                state.last_error = Some(SessionError::ExpiredLease);
                smallvec![reap]
            },
            None => SmallVec::new(),
        }
    }

    fn finalize(state: &mut SessionState, env: &SessionEnvironment, now: DateTime<Utc>, form: &BookingForm) -> Effects {
        if state.confirmed || state.finalize_in_flight {
            tracing::debug!(session_id = %state.id, "Duplicate finalize ignored");
            return SmallVec::new();
        }

        if let Some(reap) = Self::expire_if_due(state, env, now) {
            state.last_error = Some(SessionError::ExpiredLease);
            return smallvec![reap];
        }

        let handle = match state.phase {
            SessionPhase::Locked { handle, .. } => handle,
            SessionPhase::Expired => {
                state.last_error = Some(SessionError::ExpiredLease);
                return SmallVec::new();
            },
            _ => {
                state.last_error = Some(Self::refuse(state, "finalize"));
                return SmallVec::new();
            },
        };

        let identity = match form.validate(env.finalizer.policy()) {
            Ok(identity) => identity,
            Err(error) => {
                tracing::debug!(session_id = %state.id, %error, "Booking form rejected");
                state.last_error = Some(SessionError::Validation(error));
                return SmallVec::new();
            },
        };

        state.finalize_in_flight = true;
        let finalizer = env.finalizer.clone();
        smallvec![async_effect! {
            match finalizer.confirm(handle, identity).await {
                Ok(identity) => Some(SessionAction::BookingConfirmed { handle, identity }),
                Err(FinalizeError::HoldLost(_)) => Some(SessionAction::FinalizeFailed {
                    error: SessionError::HoldLost,
                }),
                Err(FinalizeError::Validation(error)) => Some(SessionAction::FinalizeFailed {
                    error: SessionError::Validation(error),
                }),
                Err(FinalizeError::Store(error)) => Some(SessionAction::FinalizeFailed {
                    error: SessionError::Store(error.to_string()),
                }),
            }
        }]
    }

    fn restart(state: &mut SessionState, env: &SessionEnvironment, now: DateTime<Utc>) -> Effects {
        let effects: Effects = Self::expire_if_due(state, env, now).into_iter().collect();

        match state.phase {
            SessionPhase::Locked { .. } | SessionPhase::Confirmed { .. } => {
                state.last_error = Some(Self::invalid(state, &SessionAction::Restart));
            },
            SessionPhase::Idle | SessionPhase::AvailabilityShown { .. } | SessionPhase::Expired => {
                state.phase = SessionPhase::Idle;
            },
        }
        effects
    }

    // ========================================================================
    // Feedback
    // ========================================================================

    fn notify_effect(env: &SessionEnvironment, handle: LockHandle, identity: &Identity) -> Effect<SessionAction> {
        let notifier = env.notifier.clone();
        let message = confirmation_message(identity, handle.date);
        let record_id = handle.record_id;
        // Delivery runs detached: the booking is already confirmed, and a
        // slow sink must not hold the request past its effect deadline.
        async_effect! {
            tokio::spawn(async move {
                match notifier.notify(message).await {
                    Ok(()) => metrics::record_notification(true),
                    Err(error) => {
                        tracing::warn!(%record_id, %error, "Booking notification not delivered");
                        metrics::record_notification(false);
                    },
                }
            });
            None
        }
    }
}

impl Reducer for SessionReducer {
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per action
    fn reduce(&self, state: &mut SessionState, action: SessionAction, env: &SessionEnvironment) -> Effects {
        let now = env.clock.now();

        if action.is_command() {
            state.last_error = None;
            state.last_seen = now;
        }

        match action {
            SessionAction::Verify { answer } => {
                if env.challenge.verify(&answer) {
                    state.verified = true;
                } else {
                    state.last_error = Some(SessionError::NotVerified);
                }
                SmallVec::new()
            },

            SessionAction::CheckAvailability => Self::check_availability(state, env, now),

            SessionAction::RequestBay => Self::request_bay(state, env, now),

            SessionAction::Tick => Self::tick(state, env, now),

            SessionAction::Finalize { form } => Self::finalize(state, env, now, &form),

            SessionAction::Restart => Self::restart(state, env, now),

            SessionAction::AvailabilityLoaded { availability } => {
                if matches!(state.phase, SessionPhase::Locked { .. } | SessionPhase::Confirmed { .. }) {
                    return SmallVec::new();
                }
                state.phase = SessionPhase::AvailabilityShown {
                    date: availability.date,
                    availability,
                };
                SmallVec::new()
            },

            SessionAction::LockAcquired { hold } => {
                tracing::info!(
                    session_id = %state.id,
                    record_id = %hold.handle.record_id,
                    date = %hold.handle.date,
                    "Hold acquired"
                );
                state.phase = SessionPhase::Locked {
                    handle: hold.handle,
                    date: hold.handle.date,
                    locked_at: hold.acquired_at,
                };
                SmallVec::new()
            },

            SessionAction::LockRejected { error } => {
                tracing::info!(session_id = %state.id, code = error.code(), "Hold rejected");
                state.phase = SessionPhase::Idle;
                state.last_error = Some(error);
                SmallVec::new()
            },

            SessionAction::BookingConfirmed { handle, identity } => {
                state.finalize_in_flight = false;
                if state.confirmed {
                    return SmallVec::new();
                }
                state.confirmed = true;
                state.phase = SessionPhase::Confirmed {
                    handle,
                    date: handle.date,
                };
                metrics::record_booking_confirmed();
                smallvec![Self::notify_effect(env, handle, &identity)]
            },

            SessionAction::FinalizeFailed { error } => {
                state.finalize_in_flight = false;
                // A lost hold cannot be retried; a store failure can.
                if error == SessionError::HoldLost {
                    state.phase = SessionPhase::Idle;
                }
                state.last_error = Some(error);
                SmallVec::new()
            },

            SessionAction::StoreFailed { error } => {
                tracing::warn!(session_id = %state.id, %error, "Availability check failed");
                if !matches!(state.phase, SessionPhase::Locked { .. } | SessionPhase::Confirmed { .. }) {
                    state.phase = SessionPhase::Idle;
                }
                state.last_error = Some(SessionError::Store(error));
                SmallVec::new()
            },

            SessionAction::ExpiredReaped { deleted } => {
                tracing::debug!(session_id = %state.id, deleted, "Reaped after expiry");
                SmallVec::new()
            },
        }
    }
}
