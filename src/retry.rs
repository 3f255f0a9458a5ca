//! Retry policy for upstream loads.
//!
//! A [`RetryPolicy`] is a plain value injected into the coordinator. It owns
//! the attempt budget and backoff schedule and folds every provider failure
//! into one of the three [`LoadOutcome`] variants.

use crate::error::ProviderError;
use std::future::Future;
use std::time::Duration;

/// 5 minutes: the longest the background poller waits between automatic
/// retries.
pub const MAX_BACKOFF_SECS: u64 = 300;

/// Compute backoff delay: `min(base_interval * 2^failures, MAX_BACKOFF_SECS)`.
pub fn backoff_delay(base_interval: u64, failures: u32) -> u64 {
    let multiplier = 1u64.checked_shl(failures).unwrap_or(u64::MAX);
    base_interval
        .saturating_mul(multiplier)
        .clamp(1, MAX_BACKOFF_SECS)
}

/// Classified result of one load. Never carries a raw error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<T> {
    Loaded(T),
    /// Failed, but the caller may keep showing what it has.
    Transient(String),
    /// Retry budget spent or the provider gave up. Escalate.
    Exhausted(String),
}

impl<T> LoadOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> LoadOutcome<U> {
        match self {
            LoadOutcome::Loaded(v) => LoadOutcome::Loaded(f(v)),
            LoadOutcome::Transient(msg) => LoadOutcome::Transient(msg),
            LoadOutcome::Exhausted(msg) => LoadOutcome::Exhausted(msg),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }

    pub fn loaded(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// One attempt, no backoff. A failure is reported as transient since
    /// there was no budget to exhaust.
    pub fn single() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before the attempt following failure number `failures` (1-based).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let multiplier = 1u32.checked_shl(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> LoadOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("{label}: succeeded on attempt {attempt}/{attempts}");
                    }
                    return LoadOutcome::Loaded(value);
                }
                Err(ProviderError::Exhausted(msg)) => {
                    tracing::warn!("{label}: provider gave up: {msg}");
                    return LoadOutcome::Exhausted(msg);
                }
                Err(ProviderError::Transient(msg)) => {
                    if attempt >= attempts {
                        if attempts == 1 {
                            tracing::debug!("{label}: transient failure: {msg}");
                            return LoadOutcome::Transient(msg);
                        }
                        tracing::warn!("{label}: giving up after {attempts} attempts: {msg}");
                        return LoadOutcome::Exhausted(format!(
                            "{msg} (gave up after {attempts} attempts)"
                        ));
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{label}: attempt {attempt}/{attempts} failed: {msg}; retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
