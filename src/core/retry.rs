//! Retry utility for async operations
//!
//! Used by polling workers to re-run a failing message handler a bounded
//! number of times with a fixed pause in between. Cancelling the token ends
//! the loop before the next attempt, including during the pause.

use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Configurable retry policy for async operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one; 0 behaves like 1
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Why [`retry_async`] gave up; both variants carry the last error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Every allowed attempt failed
    Exhausted(E),
    /// Cancelled with attempts left; `attempts` is how many actually ran
    Cancelled { error: E, attempts: usize },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted(error) => error,
            RetryError::Cancelled { error, .. } => error,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted(error) => write!(f, "{}", error),
            RetryError::Cancelled { error, attempts } => {
                write!(f, "cancelled after {} attempt(s): {}", attempts, error)
            }
        }
    }
}

/// Execute an async operation, retrying on error according to `policy`
///
/// Returns the first success. A failing attempt is retried after
/// `policy.delay` unless `cancel` fires first, in which case no further
/// attempt starts. The attempt in progress is never interrupted.
///
/// # Examples
/// ```rust
/// use tokio_util::sync::CancellationToken;
/// use topicq::core::retry::{retry_async, RetryError, RetryPolicy};
///
/// # async fn example() -> Result<String, RetryError<String>> {
/// let cancel = CancellationToken::new();
/// let result = retry_async("handler", RetryPolicy::default(), &cancel, || async {
///     Ok::<String, String>("success".to_string())
/// })
/// .await?;
/// # Ok(result)
/// # }
/// ```
pub async fn retry_async<F, T, E, Fut>(
    operation_name: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(result) => return Ok(result),
            Err(error) if attempt >= max_attempts => return Err(RetryError::Exhausted(error)),
            Err(error) => error,
        };

        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled {
                error,
                attempts: attempt,
            });
        }

        log::debug!(
            "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
            operation_name,
            attempt,
            max_attempts,
            policy.delay,
            error
        );
        if !policy.delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(RetryError::Cancelled {
                        error,
                        attempts: attempt,
                    });
                }
                _ = sleep(policy.delay) => {}
            }
        }
        attempt += 1;
    }
}
