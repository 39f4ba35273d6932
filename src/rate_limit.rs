//! Request pacing and retry with backoff
//!
//! Every outbound request is preceded by a random pause drawn from a
//! configured `[min, max]` range, and failed attempts back off according to
//! the configured strategy.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::HttpConfig;

/// Inclusive `[min, max]` millisecond range, written as a two-element array in TOML
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(from = "[u64; 2]")]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl From<[u64; 2]> for DelayRange {
    fn from(pair: [u64; 2]) -> Self {
        Self {
            min_ms: pair[0],
            max_ms: pair[1],
        }
    }
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange { min_ms: 0, max_ms: 0 };

    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// Draw a uniformly random duration from the range
    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    /// Sleep for a random duration from the range
    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            debug!("Pausing {:?}", delay);
            sleep(delay).await;
        }
    }
}

/// Retry helper with configurable backoff and a randomized pre-attempt delay
pub struct RetryHelper {
    config: HttpConfig,
}

impl RetryHelper {
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Execute an async operation up to `max_retries` times.
    ///
    /// `should_retry` decides whether a given error is worth another attempt;
    /// errors it rejects are returned immediately.
    pub async fn with_retry<T, E, F, Fut, R>(&self, operation: F, should_retry: R) -> Result<T, E>
    where
        F: Fn(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.config.request_delay_ms.pause().await;

            match operation(attempt).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !should_retry(&e) {
                        debug!("Attempt {} failed with non-retryable error: {}", attempt, e);
                        return Err(e);
                    }

                    if attempt >= self.config.max_retries {
                        warn!(
                            "All {} attempts exhausted, giving up: {}",
                            self.config.max_retries, e
                        );
                        return Err(e);
                    }

                    let delay = self.config.calculate_backoff_delay(attempt);
                    debug!(
                        "Attempt {} failed ({}), retrying in {:?} with {:?} backoff",
                        attempt, e, delay, self.config.backoff
                    );

                    sleep(delay).await;
                }
            }
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}
