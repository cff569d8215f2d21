//! Router configuration.

use super::state::AppState;
use crate::api::{sessions, window};
use axum::{
    Router,
    routing::{get, post},
};
use bay_booking_web::correlation_id_layer;
use bay_booking_web::handlers::{health_check, readiness};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// Health checks at the root, the booking API under `/api`, every request
/// tagged with a correlation id and traced.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/window", get(window::get_window))
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id/verify", post(sessions::verify))
        .route("/sessions/:id/availability", post(sessions::check_availability))
        .route("/sessions/:id/hold", post(sessions::request_bay))
        .route("/sessions/:id/confirm", post(sessions::confirm))
        .route("/sessions/:id/restart", post(sessions::restart));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .nest("/api", api_routes)
        .layer(correlation_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
