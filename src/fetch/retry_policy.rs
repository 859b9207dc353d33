//! Retry policy for failed fetches.
//!
//! Retries are explicit per failure category and disabled by default
//! (`max_retries = 0`). Backoff grows exponentially between attempts.

use std::time::Duration;

use crate::config::RetrySettings;
use crate::fetch::FetchErrorKind;

/// Retry policy implementing exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff duration in seconds.
    pub initial_backoff_secs: u64,
    /// Maximum backoff duration in seconds (cap for exponential growth).
    pub max_backoff_secs: u64,
    /// Multiplier applied to backoff after each retry.
    pub backoff_multiplier: f64,
    /// Failure categories that may be retried.
    pub retry_on: Vec<FetchErrorKind>,
}

impl RetryPolicy {
    /// Create a new RetryPolicy from configuration settings.
    pub fn new(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff_secs: settings.initial_backoff_secs,
            max_backoff_secs: settings.max_backoff_secs,
            backoff_multiplier: settings.backoff_multiplier,
            retry_on: settings.retry_on.clone(),
        }
    }

    /// Check if a failure should be retried given the number of retries already made.
    ///
    /// Categories that can never succeed on a second try (not found, blocked,
    /// interrupted) are refused even if listed in `retry_on`.
    pub fn should_retry(&self, kind: FetchErrorKind, retry_count: u32) -> bool {
        kind.is_transient() && self.retry_on.contains(&kind) && retry_count < self.max_retries
    }

    /// Backoff before retry number `retry_count + 1`.
    ///
    /// `initial_backoff * multiplier^retry_count`, capped at `max_backoff_secs`.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let exponent = i32::try_from(retry_count).unwrap_or(i32::MAX);
        let backoff = self.initial_backoff_secs as f64 * self.backoff_multiplier.powi(exponent);
        let cap = Duration::from_secs(self.max_backoff_secs);
        if backoff.is_nan() || backoff >= self.max_backoff_secs as f64 {
            return cap;
        }
        Duration::try_from_secs_f64(backoff.max(0.0))
            .map(|d| d.min(cap))
            .unwrap_or(cap)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetrySettings::default())
    }
}
