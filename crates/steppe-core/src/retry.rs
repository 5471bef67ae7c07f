//! Bounded retry with exponential backoff
//!
//! Used for calls against backing stores whose failures are often
//! transient. Every attempt is bounded by a timeout, and a timed-out attempt
//! counts as a failed attempt, so an operation never retries forever.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::{Result, SteppeError};

/// How often and how patiently to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: usize,
    /// Delay after the first failed attempt
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts
    pub max_backoff: Duration,
    /// Upper bound on a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, doubling from `initial_backoff`
    pub fn backoff_for(&self, attempt: usize) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16) as u32;
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// Outcome of a retried operation that gave up
#[derive(Debug)]
pub struct RetryExhausted {
    /// Error from the last attempt
    pub error: SteppeError,
    /// Attempts made
    pub attempts: usize,
}

/// Run `f` until it succeeds or the policy's attempts are used up
///
/// Each attempt is wrapped in `tokio::time::timeout`; a timeout becomes
/// `SteppeError::Timeout`. Returns the value and the number of attempts it
/// took, or the last error.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> std::result::Result<(T, usize), RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = match tokio::time::timeout(policy.attempt_timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(SteppeError::Timeout(policy.attempt_timeout)),
        };

        match outcome {
            Ok(val) => return Ok((val, attempt)),
            Err(error) if attempt >= max_attempts => {
                return Err(RetryExhausted {
                    error,
                    attempts: attempt,
                })
            }
            Err(e) => {
                let delay = policy.backoff_for(attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    operation_name, attempt, max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
