//! The outer retry budget and the classification of a single attempt.

use crate::Error;
use std::time::Duration;

/// Fixed-delay retry budget for the outer request loop.
///
/// A policy with `retry_count` of `n` allows `max(n, 1)` attempts, with the
/// configured delay between consecutive attempts and none after the last.
///
/// # Examples
///
/// ```
/// use http_processor::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(3, Duration::from_secs(1));
///
/// assert_eq!(policy.max_attempts(), 3);
/// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_secs(1)));
/// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_secs(1)));
/// assert_eq!(policy.delay_for_attempt(3), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retry_count: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy from a retry count and a fixed delay.
    pub fn new(retry_count: u32, delay: Duration) -> Self {
        Self { retry_count, delay }
    }

    /// The configured retry count.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The number of sends the outer loop may perform.
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.max(1)
    }

    /// Returns the delay to wait after failed attempt `attempt` (1-indexed),
    /// or `None` if the budget is spent.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_attempts() {
            Some(self.delay)
        } else {
            None
        }
    }
}

/// What one attempt of the outer loop produced.
#[derive(Debug)]
pub(crate) enum AttemptOutcome<T> {
    /// A response that should be decoded into the caller's type.
    Completed(T),
    /// A failure that consumes one unit of the retry budget.
    Retry(Error),
    /// A failure that ends the call immediately.
    Terminal(Error),
}

impl<T> AttemptOutcome<T> {
    /// Sorts a hook or transport error into retryable and terminal outcomes.
    pub(crate) fn from_error(error: Error) -> Self {
        if error.is_retryable() {
            AttemptOutcome::Retry(error)
        } else {
            AttemptOutcome::Terminal(error)
        }
    }
}
