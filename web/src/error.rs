//! The error handlers return.
//!
//! Every failure leaves the service as `{"code": "...", "message": "..."}`
//! with a matching status. Codes are stable identifiers clients branch on;
//! messages are safe to show a visitor. Internal causes are logged, never
//! rendered.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bay_booking_core::store::StoreError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// An HTTP failure with a stable code.
///
/// ```ignore
/// async fn get_session(Path(id): Path<Uuid>) -> WebResult<Json<SessionView>> {
///     let session = registry.get(id).ok_or_else(|| AppError::not_found("Session", id))?;
///     Ok(Json(session.view()))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: Cow<'static, str>,
    message: String,
    cause: Option<anyhow::Error>,
}

impl AppError {
    /// An error with an explicit status and code.
    #[must_use]
    pub fn new(status: StatusCode, code: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// 404 for a missing `kind` identified by `id`.
    #[must_use]
    pub fn not_found(kind: &str, id: impl fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{kind} {id} does not exist"))
    }

    /// 503: try again shortly.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// 500.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    /// Swap the code a constructor picked.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<Cow<'static, str>>) -> Self {
        self.code = code.into();
        self
    }

    /// Record the underlying cause for the logs.
    #[must_use]
    pub fn with_source(mut self, cause: anyhow::Error) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Stable code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Visitor-facing message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.status.as_u16(), self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// JSON body of an error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Stable code.
    pub code: String,
    /// Visitor-facing message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let cause = self.cause.as_ref().map(|cause| format!("{cause:#}"));
        if self.status.is_server_error() {
            tracing::error!(
                status = self.status.as_u16(),
                code = %self.code,
                message = %self.message,
                cause = cause.as_deref(),
                "Request failed"
            );
        } else {
            tracing::debug!(status = self.status.as_u16(), code = %self.code, "Request rejected");
        }

        let body = ErrorResponse {
            code: self.code.into_owned(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(cause: anyhow::Error) -> Self {
        Self::internal("Something went wrong").with_source(cause)
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        Self::unavailable("Bookings are temporarily unavailable, please retry")
            .with_code("STORE_UNAVAILABLE")
            .with_source(error.into())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn not_found_names_the_missing_thing() {
        let err = AppError::not_found("Session", "7d1c");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "404 NOT_FOUND: Session 7d1c does not exist");
    }

    #[test]
    fn code_can_be_specialised() {
        let err = AppError::new(StatusCode::GONE, "GONE", "hold ended").with_code("LEASE_EXPIRED");
        assert_eq!(err.code(), "LEASE_EXPIRED");
        assert_eq!(err.status(), StatusCode::GONE);
    }

    #[test]
    fn store_failures_hide_their_detail() {
        let err = AppError::from(StoreError::Unavailable("connection refused".into()));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
        assert!(!err.message().contains("refused"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn body_carries_code_and_message_only() {
        let response = AppError::internal("Something went wrong")
            .with_source(anyhow::anyhow!("pool exhausted"))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, ErrorResponse {
            code: "INTERNAL_ERROR".into(),
            message: "Something went wrong".into(),
        });
    }
}
