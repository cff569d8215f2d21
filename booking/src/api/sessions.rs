//! Booking session endpoints.
//!
//! Each request maps to one [`SessionAction`]; the handler dispatches it
//! through the registry and answers with the resulting view, or with the
//! error the action left on the session.
//!
//! - `POST /api/sessions` - start a session
//! - `GET  /api/sessions/:id` - tick the countdown, then view
//! - `POST /api/sessions/:id/verify` - answer the challenge
//! - `POST /api/sessions/:id/availability` - reap and count free bays
//! - `POST /api/sessions/:id/hold` - take a hold
//! - `POST /api/sessions/:id/confirm` - submit the booking form
//! - `POST /api/sessions/:id/restart` - start over

use crate::lease::BookingForm;
use crate::server::AppState;
use crate::session::{SessionAction, SessionId, SessionState, SessionView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use bay_booking_web::{AppError, WebResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Response for `POST /api/sessions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSession {
    /// New session id.
    pub session_id: SessionId,
    /// Always `idle`.
    pub phase: String,
    /// Challenge question to answer before a hold, if enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

/// Body of `POST /api/sessions/:id/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyRequest {
    /// The visitor's answer.
    pub answer: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a session.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/sessions
/// ```
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreatedSession>) {
    let session = state.registry.create().await;
    let challenge = state.registry.environment().challenge.question();

    (
        StatusCode::CREATED,
        Json(CreatedSession {
            session_id: session.id,
            phase: session.phase.name().to_string(),
            challenge,
        }),
    )
}

/// Tick the lease countdown and return the session.
pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> WebResult<Json<SessionView>> {
    dispatch(&state, id, SessionAction::Tick).await
}

/// Answer the challenge question.
pub async fn verify(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> WebResult<Json<SessionView>> {
    dispatch(&state, id, SessionAction::Verify { answer: request.answer }).await
}

/// Reap stale holds and count free bays for the booking date.
pub async fn check_availability(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> WebResult<Json<SessionView>> {
    dispatch(&state, id, SessionAction::CheckAvailability).await
}

/// Take a hold on one bay.
pub async fn request_bay(Path(id): Path<Uuid>, State(state): State<AppState>) -> WebResult<Json<SessionView>> {
    dispatch(&state, id, SessionAction::RequestBay).await
}

/// Submit the booking form for the held bay.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/sessions/$ID/confirm \
///   -H 'content-type: application/json' \
///   -d '{"first_name":"Jordan","surname":"Lee","email":"jordan.lee@maca.com.au",
///        "mobile":"0400 000 000","registration":"ABC123"}'
/// ```
pub async fn confirm(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(form): Json<BookingForm>,
) -> WebResult<Json<SessionView>> {
    dispatch(&state, id, SessionAction::Finalize { form }).await
}

/// Return to `idle` after an expiry or rejection.
pub async fn restart(Path(id): Path<Uuid>, State(state): State<AppState>) -> WebResult<Json<SessionView>> {
    dispatch(&state, id, SessionAction::Restart).await
}

async fn dispatch(state: &AppState, id: Uuid, action: SessionAction) -> WebResult<Json<SessionView>> {
    let next = state
        .registry
        .dispatch(SessionId::from_uuid(id), action)
        .await?;
    respond(state, &next)
}

fn respond(state: &AppState, session: &SessionState) -> WebResult<Json<SessionView>> {
    if let Some(error) = session.last_error.clone() {
        return Err(AppError::from(error));
    }

    let env = state.registry.environment();
    Ok(Json(session.view(env.clock.now(), env.lock_duration())))
}
