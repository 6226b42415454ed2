// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Fetch Retry Policy
 * Bounded exponential backoff for transient transport failures
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use crate::errors::TransportError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How often and how patiently a single candidate is re-fetched
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of the delay randomized in both directions; 0 disables jitter
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(3),
            backoff_multiplier: 2.0,
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// `max_retries` extra attempts after the first fetch
    pub fn from_retries(max_retries: u32) -> Self {
        Self::default().with_max_attempts(max_retries.saturating_add(1))
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// Delay before retry number `retry` (1-based). Zero for the first fetch.
    pub fn calculate_backoff(&self, retry: u32) -> Duration {
        let Some(exponent) = retry.checked_sub(1) else {
            return Duration::ZERO;
        };

        let scale = self.backoff_multiplier.powi(exponent.min(32) as i32);
        let delay_ms = (self.initial_backoff.as_secs_f64() * 1000.0 * scale)
            .min(self.max_backoff.as_secs_f64() * 1000.0);

        if self.jitter_factor <= 0.0 || delay_ms <= 0.0 {
            return Duration::from_millis(delay_ms as u64);
        }

        let spread = delay_ms * self.jitter_factor;
        let jittered = delay_ms + rand::rng().random_range(-spread..=spread);
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Run `operation` until it succeeds, fails with a permanent error, or the
/// attempt budget is spent. The last error is returned as is.
pub async fn retry_transport<F, Fut, T>(
    config: &RetryConfig,
    url: &str,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || attempt >= config.max_attempts {
            return Err(err);
        }

        let delay = config.calculate_backoff(attempt);
        debug!(
            url = url,
            attempt = attempt,
            kind = err.kind(),
            delay_ms = delay.as_millis() as u64,
            "Retrying fetch"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
