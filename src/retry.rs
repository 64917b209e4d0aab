//! Bounded retry and timeout utilities.
//!
//! Nothing here knows about sessions. Callers decide which errors are worth a
//! second attempt and what has to happen before it.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Policy controlling retry attempts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts including the first attempt.
    pub max_attempts: usize,
    /// Delay applied before every retry.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// One retry after a session renewal, with no delay in between.
    pub fn session_renewal() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::session_renewal()
    }
}

/// Executes an async operation with retry behavior controlled by `policy`.
///
/// `op` receives the 1-based attempt number. `should_retry` decides whether a
/// failed attempt is repeated; the last error is returned once attempts run
/// out.
pub async fn retry_async<T, E, Op, Fut, ShouldRetry>(
    policy: &RetryPolicy,
    mut op: Op,
    mut should_retry: ShouldRetry,
) -> Result<T, E>
where
    Op: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    ShouldRetry: FnMut(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if attempt >= max_attempts || !should_retry(&error) {
            return Err(error);
        }

        debug!(
            event = "retry_attempt_failed",
            attempt,
            max_attempts,
            backoff_ms = policy.backoff.as_millis() as u64
        );
        if !policy.backoff.is_zero() {
            tokio::time::sleep(policy.backoff).await;
        }
        attempt += 1;
    }
}

/// Applies a timeout to an async computation.
pub async fn with_timeout<T, Fut>(
    timeout: Duration,
    future: Fut,
) -> Result<T, tokio::time::error::Elapsed>
where
    Fut: Future<Output = T>,
{
    tokio::time::timeout(timeout, future).await
}
