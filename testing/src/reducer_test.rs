//! Given-When-Then harness for reducers.
//!
//! Seed a state, optionally replay earlier actions, reduce one action and
//! check what came out. Reducers are pure, so none of this needs a runtime.

#![allow(clippy::module_name_repetitions)]

use bay_booking_core::{effect::Effect, reducer::Reducer};

enum Check<S, A> {
    State(Box<dyn FnOnce(&S)>),
    Effects(Box<dyn FnOnce(&[Effect<A>])>),
}

/// One reducer step under test.
///
/// Checks run in the order they were added, after the action is reduced.
///
/// ```ignore
/// ReducerTest::new(SessionReducer::new())
///     .with_env(env)
///     .given_state(SessionState::new(id, now))
///     .when_action(SessionAction::CheckAvailability)
///     .then_state(|s| assert!(s.last_error.is_none()))
///     .then_effects(assertions::assert_has_future_effect)
///     .run();
/// ```
pub struct ReducerTest<R: Reducer> {
    reducer: R,
    env: Option<R::Environment>,
    state: Option<R::State>,
    prelude: Vec<R::Action>,
    action: Option<R::Action>,
    checks: Vec<Check<R::State, R::Action>>,
}

impl<R: Reducer> ReducerTest<R> {
    /// Start a test for `reducer`.
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            env: None,
            state: None,
            prelude: Vec::new(),
            action: None,
            checks: Vec::new(),
        }
    }

    /// Environment passed to every reduction.
    #[must_use]
    pub fn with_env(mut self, env: R::Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Starting state.
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.state = Some(state);
        self
    }

    /// Actions reduced before the one under test. Their effects are dropped
    /// unrun.
    #[must_use]
    pub fn given_actions(mut self, actions: impl IntoIterator<Item = R::Action>) -> Self {
        self.prelude.extend(actions);
        self
    }

    /// The action under test.
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Check the state after the action.
    #[must_use]
    pub fn then_state(mut self, check: impl FnOnce(&R::State) + 'static) -> Self {
        self.checks.push(Check::State(Box::new(check)));
        self
    }

    /// Check the effects the action returned.
    #[must_use]
    pub fn then_effects(mut self, check: impl FnOnce(&[Effect<R::Action>]) + 'static) -> Self {
        self.checks.push(Check::Effects(Box::new(check)));
        self
    }

    /// Reduce and run the checks.
    ///
    /// # Panics
    ///
    /// If the environment, state or action was never given, or a check
    /// fails.
    #[allow(clippy::expect_used)]
    pub fn run(self) {
        let env = self.env.expect("call with_env() before run()");
        let mut state = self.state.expect("call given_state() before run()");
        let action = self.action.expect("call when_action() before run()");

        for earlier in self.prelude {
            drop(self.reducer.reduce(&mut state, earlier, &env));
        }
        let effects = self.reducer.reduce(&mut state, action, &env);

        for check in self.checks {
            match check {
                Check::State(check) => check(&state),
                Check::Effects(check) => check(&effects),
            }
        }
    }
}

/// Checks for use with [`ReducerTest::then_effects`].
pub mod assertions {
    use bay_booking_core::effect::Effect;

    /// Nothing but `Effect::None`.
    ///
    /// # Panics
    ///
    /// If any effect carries work.
    pub fn assert_no_effects<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(Effect::is_none),
            "expected no effects, got {effects:?}"
        );
    }

    /// Exactly `expected` effects, `Effect::None` included.
    ///
    /// # Panics
    ///
    /// On a different count.
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(effects.len(), expected, "effects: {effects:?}");
    }

    /// At least one effect carries async work.
    ///
    /// # Panics
    ///
    /// If none does.
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(Effect::is_future),
            "expected a future effect, got {effects:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bay_booking_core::reducer::Effects;
    use bay_booking_core::{async_effect, smallvec};

    #[derive(Debug, Default)]
    struct Bays {
        free: u32,
    }

    #[derive(Debug)]
    enum BayAction {
        Open(u32),
        Hold,
    }

    struct BayReducer;

    impl Reducer for BayReducer {
        type State = Bays;
        type Action = BayAction;
        type Environment = ();

        fn reduce(&self, state: &mut Bays, action: BayAction, (): &()) -> Effects<BayAction> {
            match action {
                BayAction::Open(n) => {
                    state.free += n;
                    smallvec![Effect::None]
                },
                BayAction::Hold => match state.free.checked_sub(1) {
                    Some(free) => {
                        state.free = free;
                        smallvec![async_effect! { None }]
                    },
                    None => Effects::new(),
                },
            }
        }
    }

    #[test]
    fn reduces_the_action_under_test() {
        ReducerTest::new(BayReducer)
            .with_env(())
            .given_state(Bays::default())
            .when_action(BayAction::Open(2))
            .then_state(|bays| assert_eq!(bays.free, 2))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn earlier_actions_shape_the_starting_point() {
        ReducerTest::new(BayReducer)
            .with_env(())
            .given_state(Bays::default())
            .given_actions([BayAction::Open(1)])
            .when_action(BayAction::Hold)
            .then_state(|bays| assert_eq!(bays.free, 0))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    #[should_panic(expected = "expected a future effect")]
    fn missing_future_is_reported() {
        ReducerTest::new(BayReducer)
            .with_env(())
            .given_state(Bays::default())
            .when_action(BayAction::Hold)
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }
}
