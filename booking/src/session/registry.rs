//! Session registry.
//!
//! Keeps each session's [`SessionState`] between requests. A request locks
//! its session, runs one action through a fresh runtime `Store` seeded with
//! the saved state, waits for every cascaded effect, and saves the result.
//! Requests for one session are therefore serialised; different sessions
//! never share anything but the reservation table.

use super::actions::SessionAction;
use super::environment::SessionEnvironment;
use super::reducer::SessionReducer;
use super::types::{SessionId, SessionState};
use crate::metrics;
use bay_booking_runtime::{RuntimeError, Store};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Registry failures.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No such session (never created, or evicted).
    #[error("Session {0} not found")]
    NotFound(SessionId),

    /// The action's effects timed out or died. The session keeps its
    /// previous state; a hold taken meanwhile is left to the reaper.
    #[error("Session runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

type Slot = Arc<Mutex<SessionState>>;

/// Live sessions keyed by id.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Slot>>>,
    env: SessionEnvironment,
    effect_timeout: Duration,
}

impl SessionRegistry {
    /// Create an empty registry. `effect_timeout` bounds how long one
    /// request waits for its effects.
    #[must_use]
    pub fn new(env: SessionEnvironment, effect_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            env,
            effect_timeout,
        }
    }

    /// The environment sessions run against.
    #[must_use]
    pub const fn environment(&self) -> &SessionEnvironment {
        &self.env
    }

    /// Start a new session.
    pub async fn create(&self) -> SessionState {
        let state = SessionState::new(SessionId::new(), self.env.clock.now());
        let mut sessions = self.sessions.write().await;
        sessions.insert(state.id, Arc::new(Mutex::new(state.clone())));
        metrics::set_active_sessions(sessions.len());
        tracing::debug!(session_id = %state.id, "Session created");
        state
    }

    /// Current state of `id`, without running any action.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] for unknown ids.
    pub async fn snapshot(&self, id: SessionId) -> Result<SessionState, RegistryError> {
        let slot = self.slot(id).await?;
        let state = slot.lock().await.clone();
        Ok(state)
    }

    /// Run `action` against session `id` and return the resulting state.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] for unknown ids; [`RegistryError::Runtime`]
    /// if the effects outlive the timeout or end without completing.
    #[tracing::instrument(skip(self, action), fields(action = action.name()))]
    pub async fn dispatch(&self, id: SessionId, action: SessionAction) -> Result<SessionState, RegistryError> {
        let slot = self.slot(id).await?;
        let mut saved = slot.lock().await;

        let store = Store::new(saved.clone(), SessionReducer::new(), self.env.clone());
        let mut handle = store.send(action).await;
        handle.wait_with_timeout(self.effect_timeout).await?;

        let next = store.state(SessionState::clone).await;
        *saved = next.clone();
        Ok(next)
    }

    /// Drop sessions untouched for `idle` at `now`. Returns how many were
    /// removed.
    ///
    /// Any hold an evicted session still had is left to the reaper.
    pub async fn evict_idle(&self, now: DateTime<Utc>, idle: chrono::Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        // A session busy with a request is not idle.
        sessions.retain(|_, slot| !slot.try_lock().is_ok_and(|state| state.is_idle(now, idle)));
        let evicted = before - sessions.len();
        metrics::set_active_sessions(sessions.len());
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    async fn slot(&self, id: SessionId) -> Result<Slot, RegistryError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }
}
