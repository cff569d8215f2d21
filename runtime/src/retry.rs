//! Exponential backoff for outbound calls that fail transiently.
//!
//! The booking webhook is the main user: a chat endpoint that occasionally
//! answers 429 or drops the connection.
//!
//! ```rust
//! use bay_booking_runtime::retry::{Backoff, retry_while};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<u8, String> {
//! let backoff = Backoff::new(2)
//!     .base(Duration::from_millis(200))
//!     .cap(Duration::from_secs(2));
//!
//! retry_while(&backoff, "webhook", || async move { Ok::<_, String>(7) }, |_| true).await
//! # }
//! ```

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// How many times to retry, and how long to pause between attempts.
///
/// The pause before retry `n` (zero based) is `base * 2^n`, capped at
/// `cap`, plus up to `jitter * pause` of random spread.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Pause before the first retry.
    pub base: Duration,
    /// Longest pause.
    pub cap: Duration,
    /// Random spread as a fraction of the pause, clamped to `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Backoff {
    /// `max_retries` retries starting at 100ms, capped at 30s, no jitter.
    #[must_use]
    pub const fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            base: Duration::from_millis(100),
            cap: Duration::from_secs(30),
            jitter: 0.0,
        }
    }

    /// One attempt, no retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0)
    }

    /// Set the first pause.
    #[must_use]
    pub const fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Set the longest pause.
    #[must_use]
    pub const fn cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    /// Set the jitter fraction.
    #[must_use]
    pub const fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Pause before retry `retry`, without jitter.
    #[must_use]
    pub fn nominal(&self, retry: usize) -> Duration {
        let factor = u32::try_from(retry)
            .ok()
            .and_then(|shift| 1u32.checked_shl(shift))
            .unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Pause before retry `retry`, with jitter.
    #[must_use]
    pub fn pause(&self, retry: usize) -> Duration {
        let nominal = self.nominal(retry);
        let spread = self.jitter.clamp(0.0, 1.0);
        if spread <= 0.0 {
            return nominal;
        }
        nominal + nominal.mul_f64(rand::thread_rng().gen_range(0.0..=spread))
    }
}

/// Run `operation` until it succeeds, fails with an error `retryable`
/// rejects, or the retries in `backoff` are spent.
///
/// # Errors
///
/// The first non-retryable error, or the last error once retries run out.
pub async fn retry_while<T, E, F, Fut, P>(
    backoff: &Backoff,
    label: &'static str,
    mut operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retry = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::info!(operation = label, retries = retry, "Recovered after retry");
                }
                return Ok(value);
            },
            Err(err) => err,
        };

        if !retryable(&err) {
            tracing::warn!(operation = label, error = %err, "Permanent failure");
            return Err(err);
        }
        if retry >= backoff.max_retries {
            tracing::warn!(operation = label, retries = retry, error = %err, "Retries exhausted");
            metrics::counter!("retry.exhausted", "operation" => label).increment(1);
            return Err(err);
        }

        let pause = backoff.pause(retry);
        tracing::debug!(operation = label, retry, pause_ms = pause.as_millis(), error = %err, "Retrying");
        metrics::counter!("retry.attempts", "operation" => label).increment(1);
        tokio::time::sleep(pause).await;
        retry += 1;
    }
}
