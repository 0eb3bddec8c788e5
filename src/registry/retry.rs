//! Bounded exponential backoff for registry calls.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::RegistryError;

/// Retry policy for transient registry failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let millis = (self.initial_delay.as_millis() as f64 * factor).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Runs `operation` until it succeeds, fails permanently, runs out of
/// attempts, or `cancel` fires.
///
/// Only errors for which [`RegistryError::is_transient`] holds are retried.
/// Cancellation interrupts both the in-flight attempt and the backoff sleep
/// and yields [`RegistryError::Cancelled`].
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RegistryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RegistryError>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RegistryError::Cancelled),
            outcome = operation() => outcome,
        };

        match outcome {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempts >= config.max_attempts || !error.is_transient() {
                    return Err(error);
                }

                let delay = config.delay_after(attempts);
                tracing::debug!(
                    attempt = attempts,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retrying registry request with exponential backoff"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RegistryError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick() -> RetryConfig {
        RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_after(1), Duration::from_millis(250));
        assert_eq!(config.delay_after(2), Duration::from_millis(500));
        assert_eq!(config.delay_after(3), Duration::from_millis(1000));
        assert_eq!(config.delay_after(10), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff(&quick(), &CancellationToken::new(), || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(RegistryError::Http { status: 503 })
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_with_backoff(&quick(), &CancellationToken::new(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RegistryError::NotFound)
        })
        .await;
        assert_eq!(result.unwrap_err(), RegistryError::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<(), _> = retry_with_backoff(&quick(), &CancellationToken::new(), || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RegistryError::Timeout)
        })
        .await;
        assert_eq!(result.unwrap_err(), RegistryError::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let result: Result<(), _> = retry_with_backoff(&quick(), &token, || async {
            std::future::pending::<()>().await;
            Ok(())
        })
        .await;
        assert_eq!(result.unwrap_err(), RegistryError::Cancelled);
    }
}
