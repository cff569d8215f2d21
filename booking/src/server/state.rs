//! Application state shared by HTTP handlers.

use crate::session::SessionRegistry;
use axum::extract::FromRef;
use bay_booking_core::store::ReservationStore;
use std::sync::Arc;

/// State cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Live booking sessions.
    pub registry: SessionRegistry,
    /// The reservation table, for readiness checks.
    pub store: Arc<dyn ReservationStore>,
}

impl AppState {
    /// Create the state.
    #[must_use]
    pub fn new(registry: SessionRegistry, store: Arc<dyn ReservationStore>) -> Self {
        Self { registry, store }
    }
}

// Lets the shared readiness handler extract the store directly.
impl FromRef<AppState> for Arc<dyn ReservationStore> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}
