//! Retry with backoff and per-attempt timeout
//!
//! Shared by the sync and booking protocols so both follow the same
//! budget rules: a bounded number of attempts, a delay between attempts
//! (never after the last one), and an optional timeout per attempt.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::SlotbookError;

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// base, 2*base, 3*base, ...
    Linear,
    /// base, 2*base, 4*base, ...
    #[default]
    Exponential,
}

/// Retry budget for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// Upper bound for a single attempt; `None` lets an attempt run to completion
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff: Backoff::Exponential,
            attempt_timeout: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(attempt),
            Backoff::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.base_delay.saturating_mul(factor)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for SlotbookError {
    fn is_retryable(&self) -> bool {
        SlotbookError::is_retryable(self)
    }
}

/// Why a single attempt failed
#[derive(Debug)]
pub enum AttemptError<E> {
    TimedOut(Duration),
    Failed(E),
}

impl<E: Retryable> AttemptError<E> {
    pub fn is_retryable(&self) -> bool {
        match self {
            AttemptError::TimedOut(_) => true,
            AttemptError::Failed(e) => e.is_retryable(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            AttemptError::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Returned when the operation gave up
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Attempts actually made
    pub attempts: u32,
    /// Error of the last attempt
    pub last: AttemptError<E>,
}

impl<E: fmt::Display> fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gave up after {} attempt(s): {}", self.attempts, self.last)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget runs out. `op` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let outcome = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, op(attempt)).await {
                Ok(result) => result.map_err(AttemptError::Failed),
                Err(_) => Err(AttemptError::TimedOut(limit)),
            },
            None => op(attempt).await.map_err(AttemptError::Failed),
        };

        let err = match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !err.is_retryable() {
            debug!(operation, attempt, error = %err, "Non-retryable failure");
            return Err(RetryFailure {
                attempts: attempt,
                last: err,
            });
        }

        if attempt >= max_attempts {
            warn!(operation, attempts = attempt, error = %err, "Retry budget exhausted");
            return Err(RetryFailure {
                attempts: attempt,
                last: err,
            });
        }

        let delay = policy.delay_after(attempt);
        warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Attempt failed, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
