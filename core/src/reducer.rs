//! The reducer trait.
//!
//! A reducer is the only place session state changes. It never performs I/O:
//! anything that touches the reservation table, the clock's future or the
//! notification sink is returned as an [`Effect`] for the runtime to run.

use crate::effect::Effect;
use smallvec::SmallVec;

/// Effects returned by one reduction. Most actions return none or one.
pub type Effects<A> = SmallVec<[Effect<A>; 4]>;

/// `(State, Action, Environment) -> (State', Effects)`.
///
/// # Example
///
/// ```
/// use bay_booking_core::reducer::{Effects, Reducer};
///
/// struct Countdown;
///
/// impl Reducer for Countdown {
///     type State = u32;
///     type Action = ();
///     type Environment = ();
///
///     fn reduce(&self, remaining: &mut u32, _tick: (), _env: &()) -> Effects<()> {
///         *remaining = remaining.saturating_sub(1);
///         Effects::new()
///     }
/// }
///
/// let mut remaining = 2;
/// assert!(Countdown.reduce(&mut remaining, (), &()).is_empty());
/// assert_eq!(remaining, 1);
/// ```
pub trait Reducer {
    /// State owned by one instance (one booking session, for example).
    type State;

    /// Commands from callers and results fed back by effects.
    type Action;

    /// Injected collaborators.
    type Environment;

    /// Apply `action` to `state` and describe the follow-up work.
    ///
    /// Must be deterministic for a given state, action and environment
    /// snapshot; the clock is read through the environment.
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> Effects<Self::Action>;
}
