//! # Bay Booking Runtime
//!
//! Executes the effects a [`Reducer`] returns and feeds their results back
//! into it.
//!
//! A booking request builds a short-lived [`Store`] around one session's
//! state, sends one command, and waits on the returned [`EffectHandle`]
//! until the whole cascade has settled:
//!
//! ```text
//! RequestBay ─▶ reduce ─▶ acquire effect ─▶ LockAcquired ─▶ reduce ─▶ (no effects)
//!    send()                  spawned           fed back                  handle settles
//! ```
//!
//! The [`retry`] module holds the backoff helper outbound calls use.
//!
//! ## Example
//!
//! ```ignore
//! use bay_booking_runtime::Store;
//!
//! let store = Store::new(saved.clone(), SessionReducer::new(), env.clone());
//! let mut handle = store.send(SessionAction::RequestBay).await;
//! handle.wait_with_timeout(Duration::from_secs(10)).await?;
//! let next = store.state(SessionState::clone).await;
//! ```

use bay_booking_core::{effect::Effect, reducer::Reducer};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, watch};

/// Retry logic with exponential backoff
pub mod retry;

/// Runtime errors.
pub mod error {
    use thiserror::Error;

    /// Why waiting on an [`EffectHandle`](super::EffectHandle) failed.
    #[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RuntimeError {
        /// Effects were still running when the deadline passed.
        #[error("Timed out waiting for effects")]
        Timeout,

        /// Effects ended without completing (panicked or cancelled), so
        /// their feedback never reached the reducer.
        #[error("{0} effect(s) ended without completing")]
        EffectAbandoned(usize),
    }
}

pub use error::RuntimeError;

// ============================================================================
// Completion tracking
// ============================================================================

/// Waits for one command and every action it cascaded into.
///
/// Returned by [`Store::send`]. Feedback actions are reduced under the same
/// handle, so a wait only returns once the chain (command, store call,
/// feedback event, follow-up notification) has settled.
pub struct EffectHandle {
    in_flight: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
    settled: watch::Receiver<()>,
}

impl EffectHandle {
    fn new() -> (Self, Tracker) {
        let (tx, rx) = watch::channel(());
        let tracker = Tracker {
            in_flight: Arc::new(AtomicUsize::new(0)),
            abandoned: Arc::new(AtomicUsize::new(0)),
            settled: Arc::new(tx),
        };
        let handle = Self {
            in_flight: Arc::clone(&tracker.in_flight),
            abandoned: Arc::clone(&tracker.abandoned),
            settled: rx,
        };
        (handle, tracker)
    }

    /// Effects still running.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until nothing is running.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::EffectAbandoned`] if any effect ended without
    /// completing.
    pub async fn wait(&mut self) -> Result<(), RuntimeError> {
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            if self.settled.changed().await.is_err() {
                break;
            }
        }

        match self.abandoned.load(Ordering::SeqCst) {
            0 => Ok(()),
            n => Err(RuntimeError::EffectAbandoned(n)),
        }
    }

    /// [`wait`](Self::wait) with a deadline.
    ///
    /// # Errors
    ///
    /// [`RuntimeError::Timeout`] if effects are still running at the
    /// deadline, otherwise as [`wait`](Self::wait).
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), RuntimeError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| RuntimeError::Timeout)?
    }
}

impl fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending", &self.pending())
            .field("abandoned", &self.abandoned.load(Ordering::SeqCst))
            .finish()
    }
}

/// Counters shared by every effect spawned under one handle.
#[derive(Clone)]
struct Tracker {
    in_flight: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
    settled: Arc<watch::Sender<()>>,
}

impl Tracker {
    fn start(&self) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight {
            tracker: self.clone(),
            completed: false,
        }
    }
}

/// Held by a running effect task. Dropping it without
/// [`complete`](Self::complete) counts the effect as abandoned.
struct InFlight {
    tracker: Tracker,
    completed: bool,
}

impl InFlight {
    fn complete(mut self) {
        self.completed = true;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.completed {
            self.tracker.abandoned.fetch_add(1, Ordering::SeqCst);
            metrics::counter!("store.effects.abandoned").increment(1);
        }
        if self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.tracker.settled.send(());
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// Store runtime: state, reducer and environment behind one handle.
pub mod store {
    use super::{Arc, Effect, EffectHandle, Instant, Reducer, RwLock, Tracker};

    /// Holds state, runs the reducer and executes effects with a feedback
    /// loop.
    ///
    /// Cheap to clone; clones share state.
    pub struct Store<R: Reducer> {
        state: Arc<RwLock<R::State>>,
        reducer: Arc<R>,
        environment: Arc<R::Environment>,
    }

    impl<R> Store<R>
    where
        R: Reducer + Send + Sync + 'static,
        R::State: Send + Sync + 'static,
        R::Action: Send + std::fmt::Debug + 'static,
        R::Environment: Send + Sync + 'static,
    {
        /// Create a store around `initial_state`.
        #[must_use]
        pub fn new(initial_state: R::State, reducer: R, environment: R::Environment) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
            }
        }

        /// Reduce `action` and start its effects.
        ///
        /// Returns once the reducer has run; use the handle to wait for the
        /// effects.
        #[tracing::instrument(skip_all, name = "store_send")]
        pub async fn send(&self, action: R::Action) -> EffectHandle {
            let (handle, tracker) = EffectHandle::new();
            self.dispatch(action, &tracker).await;
            handle
        }

        /// Read state through a closure.
        ///
        /// ```ignore
        /// let phase = store.state(|s| s.phase.name()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&R::State) -> T,
        {
            f(&*self.state.read().await)
        }

        async fn dispatch(&self, action: R::Action, tracker: &Tracker) {
            tracing::debug!(?action, "Reducing");
            metrics::counter!("store.actions.total").increment(1);

            let effects = {
                let mut state = self.state.write().await;
                let started = Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds").record(started.elapsed().as_secs_f64());
                effects
            };

            for effect in effects {
                self.spawn_effect(effect, tracker);
            }
        }

        fn spawn_effect(&self, effect: Effect<R::Action>, tracker: &Tracker) {
            let Effect::Future(fut) = effect else {
                return;
            };

            metrics::counter!("store.effects.spawned").increment(1);
            let in_flight = tracker.start();
            let store = self.clone();
            let tracker = tracker.clone();

            tokio::spawn(async move {
                if let Some(feedback) = fut.await {
                    store.dispatch(feedback, &tracker).await;
                }
                in_flight.complete();
            });
        }
    }

    impl<R: Reducer> Clone for Store<R> {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
            }
        }
    }
}

pub use store::Store;
