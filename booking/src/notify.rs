//! Notification sinks.
//!
//! Confirmed bookings are announced on a chat webhook. Delivery is best
//! effort: the session logs and counts failures, never surfaces them.

use bay_booking_core::notify::{NotifyError, NotifyFuture, Notifier};
use bay_booking_runtime::retry::{Backoff, retry_while};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts `{"text": message}` to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    backoff: Backoff,
}

impl WebhookNotifier {
    /// Create a notifier for `url`.
    ///
    /// Each attempt is bounded by `timeout`; transport failures, 429 and 5xx
    /// responses are retried up to `max_retries` times with exponential
    /// backoff.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration, max_retries: usize) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let backoff = Backoff::new(max_retries)
            .base(Duration::from_millis(200))
            .cap(Duration::from_secs(2))
            .jitter(0.1);

        Ok(Self {
            client,
            url: url.into(),
            backoff,
        })
    }

    async fn post(&self, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { text: message })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected {
                status: status.as_u16(),
            })
        }
    }
}

fn is_retryable(error: &NotifyError) -> bool {
    match error {
        NotifyError::Transport(_) => true,
        NotifyError::Rejected { status } => *status == 429 || *status >= 500,
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, message: String) -> NotifyFuture<'_> {
        Box::pin(async move {
            retry_while(&self.backoff, "webhook_notify", || self.post(&message), is_retryable).await
        })
    }
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: String) -> NotifyFuture<'_> {
        Box::pin(async move {
            tracing::info!(%message, "Booking notification");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn retries_transport_and_server_errors_only() {
        assert!(is_retryable(&NotifyError::Transport("reset".into())));
        assert!(is_retryable(&NotifyError::Rejected { status: 503 }));
        assert!(is_retryable(&NotifyError::Rejected { status: 429 }));
        assert!(!is_retryable(&NotifyError::Rejected { status: 404 }));
    }

    #[tokio::test]
    async fn unreachable_webhook_fails_after_retries() {
        // Port 9 (discard) on localhost refuses connections.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", Duration::from_millis(200), 1).unwrap();
        let result = notifier.notify("hello".to_string()).await;
        assert!(matches!(result, Err(NotifyError::Transport(_))));
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.notify("hello".to_string()).await.is_ok());
    }
}
