use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Attempt limit and exponential backoff: `base_delay * factor^n` before
/// attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            factor: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after the failed attempt with 0-based index `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(self.factor.saturating_pow(attempt))
    }
}

#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    /// Last thrown error. `None` when every attempt came back empty.
    pub last_error: Option<E>,
}

/// Runs `operation` until it yields `Ok(Some(_))` or the attempts run out.
/// `Ok(None)` counts as a failed attempt but does not replace the last error.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        match operation(attempt).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {
                log::warn!(
                    "{}: attempt {}/{} returned no data",
                    label,
                    attempt + 1,
                    policy.max_attempts
                );
            }
            Err(e) => {
                log::warn!(
                    "{}: attempt {}/{} failed: {}",
                    label,
                    attempt + 1,
                    policy.max_attempts,
                    e
                );
                last_error = Some(e);
            }
        }

        if attempt + 1 < policy.max_attempts {
            let delay = policy.delay_for(attempt);
            log::info!(
                "{}: waiting {}ms before attempt {}",
                label,
                delay.as_millis(),
                attempt + 2
            );
            sleep(delay).await;
        }
    }

    Err(RetryExhausted {
        attempts: policy.max_attempts,
        last_error,
    })
}
