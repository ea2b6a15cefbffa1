//! Bounded Retry for Mutating Storage Calls
//!
//! Every copy, delete and put issued by the transition engine runs through
//! [`retry_with_policy`]:
//!
//! ```text
//! ├─→ Attempt 1: immediate
//! ├─→ Attempt 2: wait `delay`
//! └─→ Attempt 3: wait `delay`      → give up, report RetryError
//! ```
//!
//! Existence probes are never retried: a not-found there is an answer, not a
//! transient failure. The retry predicate therefore has nothing to say about
//! not-found; it only decides whether a failed mutation is worth another try.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::StorageError;

pub type RetryPredicate = fn(&StorageError) -> bool;

/// Retry every error.
pub fn any_error(_: &StorageError) -> bool {
    true
}

/// Retry policy for storage mutations.
///
/// # Fields
///
/// * `max_attempts` - Total attempts including the first (default: 3)
/// * `delay` - Fixed wait between attempts (default: 2s)
/// * `retryable` - Which errors earn another attempt (default: all)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
    pub retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration, retryable: RetryPredicate) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            retryable,
        }
    }

    /// Fixed delay, every error retried.
    pub fn fixed(max_attempts: usize, delay: Duration) -> Self {
        Self::new(max_attempts, delay, any_error)
    }

    /// Wait before the attempt following `attempt` (1-indexed).
    pub fn backoff(&self, _attempt: usize) -> Duration {
        self.delay
    }

    pub fn is_retryable(&self, err: &StorageError) -> bool {
        (self.retryable)(err)
    }
}

/// A mutation that did not succeed within its retry budget.
#[derive(Debug, Error)]
#[error("{operation} {key} failed after {attempts} attempt(s): {source}")]
pub struct RetryError {
    pub operation: &'static str,
    pub key: String,
    pub attempts: usize,
    #[source]
    pub source: StorageError,
}

/// Run `operation` until it succeeds, the error is not retryable, or the
/// attempt budget is spent.
pub async fn retry_with_policy<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &'static str,
    key: &str,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        key = %key,
                        attempt,
                        "Storage call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !policy.is_retryable(&err) || attempt >= policy.max_attempts {
                    warn!(
                        operation = operation_name,
                        key = %key,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "Storage call failed, giving up"
                    );
                    return Err(RetryError {
                        operation: operation_name,
                        key: key.to_string(),
                        attempts: attempt,
                        source: err,
                    });
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    operation = operation_name,
                    key = %key,
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "Storage call failed, retrying"
                );
                sleep(backoff).await;
            }
        }
    }
}
