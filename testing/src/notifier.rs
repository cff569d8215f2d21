//! Notification sinks for tests.

use bay_booking_core::notify::{NotifyError, NotifyFuture, Notifier};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Captures every delivered message.
///
/// Clones share the same log. Confirmations are delivered in the
/// background, so assert on [`wait_for`](Self::wait_for) rather than an
/// immediate [`count`](Self::count).
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that takes `delay` to accept each message, like a
    /// webhook on a bad day.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Wait until at least `expected` messages arrived, giving up after
    /// `within`. Returns whether they did.
    pub async fn wait_for(&self, expected: usize, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            if self.count() >= expected {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Messages delivered so far, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of messages delivered so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: String) -> NotifyFuture<'_> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.messages
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(message);
            Ok(())
        })
    }
}

/// Always fails, counting attempts.
#[derive(Debug, Clone, Default)]
pub struct FailingNotifier {
    attempts: Arc<AtomicUsize>,
}

impl FailingNotifier {
    /// Create a sink that rejects everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery attempts so far.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for FailingNotifier {
    fn notify(&self, _message: String) -> NotifyFuture<'_> {
        Box::pin(async move {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::Transport("sink unreachable".to_string()))
        })
    }
}
