//! Application wiring.
//!
//! Builds the store, lease protocol pieces, session registry, router and
//! sweeper from a [`Config`].

use crate::challenge::{OpenGate, StaticChallenge};
use crate::config::{Config, ConfigError, StoreBackend};
use crate::lease::{BookingFinalizer, CapacityChecker, Reaper, acquirer_for};
use crate::notify::{LogNotifier, WebhookNotifier};
use crate::server::{AppState, build_router};
use crate::session::{SessionEnvironment, SessionRegistry};
use crate::sweeper::Sweeper;
use axum::Router;
use bay_booking_core::challenge::ChallengeGate;
use bay_booking_core::environment::{Clock, SystemClock};
use bay_booking_core::notify::{Notifier, NotifyError};
use bay_booking_core::store::{ReservationStore, StoreError};
use bay_booking_postgres::PostgresReservationStore;
use bay_booking_testing::InMemoryReservationStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure assembling the application.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The reservation store could not be opened or migrated.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The notification client could not be built.
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// The assembled service.
#[derive(Clone)]
pub struct BookingApp {
    config: Config,
    store: Arc<dyn ReservationStore>,
    registry: SessionRegistry,
    reaper: Reaper,
    clock: Arc<dyn Clock>,
}

impl BookingApp {
    /// Validate `config`, open the configured store and wire everything with
    /// the system clock.
    ///
    /// # Errors
    ///
    /// See [`StartupError`].
    pub async fn build(config: Config) -> Result<Self, StartupError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let store: Arc<dyn ReservationStore> = match config.database.backend {
            StoreBackend::Postgres => {
                let store = PostgresReservationStore::connect(&config.database.url, &config.pool_settings()).await?;
                store.migrate().await?;
                Arc::new(store)
            },
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory reservation store; bookings are lost on restart");
                Arc::new(InMemoryReservationStore::new(clock.clone()))
            },
        };

        let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(
                url.clone(),
                Duration::from_secs(config.notify.timeout_secs),
                config.notify.max_retries,
            )?),
            None => Arc::new(LogNotifier),
        };

        let challenge: Arc<dyn ChallengeGate> = match (&config.challenge.enabled, &config.challenge.answer) {
            (true, Some(answer)) => Arc::new(StaticChallenge::new(
                config.challenge.question.clone(),
                answer.clone(),
                config.challenge.bypass_code.clone(),
            )),
            _ => Arc::new(OpenGate),
        };

        Self::from_parts(config, store, clock, notifier, challenge)
    }

    /// Wire the application around already constructed collaborators.
    ///
    /// # Errors
    ///
    /// [`StartupError::Config`] if the window or strategy does not parse.
    pub fn from_parts(
        config: Config,
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        challenge: Arc<dyn ChallengeGate>,
    ) -> Result<Self, StartupError> {
        let window = config.window_gate()?;
        let strategy = config.lock_strategy()?;

        let reaper = Reaper::new(store.clone(), config.lock_duration());
        let capacity = CapacityChecker::new(store.clone(), reaper.clone(), config.booking.total_bays);
        let acquirer = acquirer_for(strategy, store.clone(), capacity.clone(), reaper.clone());
        let finalizer = BookingFinalizer::new(store.clone(), config.email_policy());

        let env = SessionEnvironment {
            clock: clock.clone(),
            window,
            capacity,
            acquirer,
            finalizer,
            reaper: reaper.clone(),
            notifier,
            challenge,
        };
        let registry = SessionRegistry::new(env, config.effect_timeout());

        tracing::info!(
            total_bays = config.booking.total_bays,
            lock_secs = config.booking.lock_duration_secs,
            strategy = %strategy,
            timezone = %config.booking.timezone,
            "Booking service assembled"
        );

        Ok(Self {
            config,
            store,
            registry,
            reaper,
            clock,
        })
    }

    /// The configuration in force.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The reservation table.
    #[must_use]
    pub fn store(&self) -> Arc<dyn ReservationStore> {
        self.store.clone()
    }

    /// Live sessions.
    #[must_use]
    pub const fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The HTTP router.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(AppState::new(self.registry.clone(), self.store.clone()))
    }

    /// The background sweeper, not yet started.
    #[must_use]
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.reaper.clone(),
            self.registry.clone(),
            self.clock.clone(),
            self.config.sweep_interval(),
            self.config.session_idle(),
        )
    }
}
