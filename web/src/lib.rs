//! HTTP plumbing shared by the booking service.
//!
//! - [`AppError`]: the one error type handlers return, rendered as
//!   `{"code", "message"}`
//! - [`handlers::health`]: liveness and store readiness
//! - [`middleware`]: correlation ids on every request and response
//!
//! Handlers turn a request into a session action, run it, and turn the
//! resulting state (or its error) back into a response:
//!
//! ```text
//! request ─▶ action ─▶ registry.dispatch ─▶ state ─▶ JSON | AppError
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;

pub use error::{AppError, ErrorResponse};
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId, correlation_id_layer};

/// What handlers return.
pub type WebResult<T> = Result<T, AppError>;
