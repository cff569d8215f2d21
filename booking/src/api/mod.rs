//! HTTP API handlers.
//!
//! - `GET /api/window` - booking window status
//! - `/api/sessions/...` - the booking flow, one action per request

pub mod sessions;
pub mod window;

use crate::session::{RegistryError, SessionError};
use axum::http::StatusCode;
use bay_booking_runtime::RuntimeError;
use bay_booking_web::AppError;

impl From<SessionError> for AppError {
    fn from(error: SessionError) -> Self {
        let status = match &error {
            SessionError::BookingClosed | SessionError::NotVerified => StatusCode::FORBIDDEN,
            SessionError::BaysFull { .. } | SessionError::InvalidTransition { .. } => StatusCode::CONFLICT,
            SessionError::ExpiredLease | SessionError::HoldLost => StatusCode::GONE,
            SessionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SessionError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        match error {
            SessionError::Store(detail) => Self::new(status, "STORE_UNAVAILABLE", "Bookings are temporarily unavailable, please retry")
                .with_source(anyhow::anyhow!(detail)),
            other => Self::new(status, other.code(), other.to_string()),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(id) => Self::not_found("Session", id),
            RegistryError::Runtime(RuntimeError::Timeout) => {
                Self::unavailable("Booking store did not answer in time, please retry")
                    .with_code("STORE_TIMEOUT")
                    .with_source(anyhow::Error::new(RuntimeError::Timeout))
            },
            RegistryError::Runtime(other) => {
                Self::internal("Session could not be processed").with_source(anyhow::Error::new(other))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::lease::{Field, FieldIssue, ValidationError};
    use crate::session::SessionId;
    use chrono::NaiveDate;

    #[test]
    fn session_errors_map_to_statuses() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let cases = [
            (SessionError::BookingClosed, StatusCode::FORBIDDEN, "BOOKING_CLOSED"),
            (SessionError::NotVerified, StatusCode::FORBIDDEN, "NOT_VERIFIED"),
            (SessionError::BaysFull { date }, StatusCode::CONFLICT, "BAYS_FULL"),
            (
                SessionError::InvalidTransition {
                    phase: "idle",
                    command: "finalize",
                },
                StatusCode::CONFLICT,
                "INVALID_TRANSITION",
            ),
            (SessionError::ExpiredLease, StatusCode::GONE, "LEASE_EXPIRED"),
            (SessionError::HoldLost, StatusCode::GONE, "HOLD_LOST"),
            (
                SessionError::Validation(ValidationError {
                    issues: vec![FieldIssue::Missing(Field::Mobile)],
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (
                SessionError::Store("refused".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
            ),
        ];

        for (error, status, code) in cases {
            let app_error = AppError::from(error);
            assert_eq!(app_error.status(), status);
            assert_eq!(app_error.code(), code);
        }
    }

    #[test]
    fn unknown_session_is_404() {
        let err = AppError::from(RegistryError::NotFound(SessionId::new()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn effect_timeout_is_retryable() {
        let err = AppError::from(RegistryError::Runtime(RuntimeError::Timeout));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "STORE_TIMEOUT");
    }
}
