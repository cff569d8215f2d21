//! Outbound booking notifications.
//!
//! Delivery is best effort: a failed notification never rolls back or fails a
//! confirmation. Callers log and count the error, then move on.

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Notification delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The sink could not be reached or timed out.
    #[error("Notification transport failed: {0}")]
    Transport(String),

    /// The sink answered with a non-success status.
    #[error("Notification rejected with status {status}")]
    Rejected {
        /// HTTP status code returned by the sink.
        status: u16,
    },
}

/// Boxed future returned by [`Notifier::notify`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + 'a>>;

/// A sink that accepts a text payload.
pub trait Notifier: Send + Sync {
    /// Deliver `message`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if delivery failed after any internal retries.
    fn notify(&self, message: String) -> NotifyFuture<'_>;
}
