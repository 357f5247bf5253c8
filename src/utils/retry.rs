//! Retry utilities for outbound calls
//!
//! [`BackoffPolicy`] holds the attempt budget and the exponential delay curve;
//! [`with_backoff`] drives an async operation through it. The policy is kept
//! apart from any transport so its timing can be tested on its own.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Exponential backoff policy
///
/// The wait after failed attempt `n` (0-indexed) is `unit × factor^n`.
/// With the default `unit` of one second this is `factor^n` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Exponential growth factor
    pub factor: f64,

    /// Time unit the factor is applied to
    pub unit: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            factor: 1.5,
            unit: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with a one-second unit
    pub fn new(max_attempts: u32, factor: f64) -> Self {
        Self {
            max_attempts,
            factor,
            ..Default::default()
        }
    }

    /// Override the delay unit (tests use milliseconds)
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Delay to wait after the given failed attempt
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.unit.as_secs_f64() * self.factor.powi(exp);

        if secs.is_finite() && secs >= 0.0 {
            Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        }
    }

    /// Whether another attempt follows `attempt`
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }
}

/// What to do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Back off and try again if attempts remain
    Retry,
    /// Give up immediately
    Fail,
}

/// Run `operation` under `policy`, retrying errors the classifier marks retryable
///
/// `operation` receives the 0-indexed attempt number. Returns the first
/// success, the first non-retryable error, or the last error once attempts
/// are used up. No delay is spent after the final attempt.
pub async fn with_backoff<T, E, F, Fut, C>(
    policy: &BackoffPolicy,
    mut operation: F,
    classify: C,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
    E: std::fmt::Display,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                if classify(&e) == RetryDecision::Fail {
                    warn!(error = %e, "Non-retryable error encountered");
                    return Err(e);
                }

                if attempt + 1 >= attempts {
                    warn!(
                        attempt = attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Retry attempts exhausted"
                    );
                    return Err(e);
                }

                let delay = policy.delay(attempt);
                warn!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Operation failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
