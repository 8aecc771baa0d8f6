//! Exponential backoff around any [`Fetch`] implementation.
//!
//! The delay before attempt `n + 1` follows:
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=max_jitter)
//! ```
//! With the defaults (3 attempts, 1s base) a failing request is tried at
//! t=0, t≈1s and t≈3s before the error is returned.

use super::{Fetch, FetchError};
use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{error, instrument, warn};

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: usize,
    /// Delay after the first failure; doubled after each further one.
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the delay.
    pub max_delay: Duration,
    /// Random extra delay, drawn uniformly from `0..=max_jitter`.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `attempt`-th failure (1-based), jitter excluded.
    pub fn backoff(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn jittered(&self, attempt: usize) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng().random_range(0..=jitter_ms))
        };
        self.backoff(attempt) + jitter
    }
}

/// Wrapper adding retry with exponential backoff to a [`Fetch`].
///
/// Only [`FetchError::is_retryable`] errors are retried.
pub struct RetryFetch<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Fetch> RetryFetch<T> {
    /// Wrap `inner` so every call is retried according to `policy`.
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn with_backoff<R, Fut>(
        &self,
        op: &'static str,
        url: &str,
        mut call: impl FnMut() -> Fut,
    ) -> Result<R, FetchError>
    where
        Fut: Future<Output = Result<R, FetchError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt >= max_attempts {
                error!(
                    op,
                    %url,
                    attempt,
                    max = max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %err,
                    "Giving up"
                );
                return Err(err);
            }

            let delay = self.policy.jittered(attempt);
            warn!(
                op,
                %url,
                attempt,
                max = max_attempts,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                ?delay,
                error = %err,
                "Attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T: Fetch> Fetch for RetryFetch<T> {
    #[instrument(level = "debug", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let inner = &self.inner;
        self.with_backoff("get_text", url, || inner.get_text(url)).await
    }

    #[instrument(level = "debug", skip(self), fields(dest = %dest.display()))]
    async fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let inner = &self.inner;
        self.with_backoff("download", url, || inner.download(url, dest))
            .await
    }
}
