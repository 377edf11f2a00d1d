use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Exponential Backoff Retry
// ============================================================================
//
// `max_attempts: None` retries until the operation succeeds or the
// cancellation token fires. Consumers use that mode for redelivery: a
// message that keeps failing blocks its partition instead of being dropped.
//
// ============================================================================

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Attempts before giving up; `None` means unbounded
    pub max_attempts: Option<u32>,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(3),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Unbounded retry used for at-least-once message handling
    pub fn redelivery() -> Self {
        Self {
            max_attempts: None,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    pub fn bounded(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            initial_delay,
            ..Self::default()
        }
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let next = Duration::from_millis((delay.as_millis() as f64 * self.multiplier) as u64);
        next.min(self.max_delay)
    }
}

#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Gave up after `max_attempts`, carrying the last error
    Failed(E),
    /// Cancellation fired while waiting between attempts
    Cancelled,
}

pub async fn retry_with_backoff<F, Fut, T, E>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Operation succeeded after retry");
                }
                return RetryResult::Success(value);
            }
            Err(error) => {
                if config.max_attempts.is_some_and(|max| attempt >= max) {
                    tracing::error!(attempt = attempt, error = %error, "Operation failed after all retries");
                    return RetryResult::Failed(error);
                }

                tracing::warn!(
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying after delay"
                );

                tokio::select! {
                    _ = cancel.cancelled() => return RetryResult::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }

                delay = config.next_delay(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: Option<u32>) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let cancel = CancellationToken::new();
        let result = retry_with_backoff(&fast(None), &cancel, |attempt| async move {
            if attempt < 4 {
                Err("not yet")
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Success(4)));
    }

    #[tokio::test]
    async fn test_bounded_gives_up() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let counter = calls.clone();

        let result: RetryResult<(), &str> = retry_with_backoff(&fast(Some(3)), &cancel, |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("down")
            }
        })
        .await;

        assert!(matches!(result, RetryResult::Failed("down")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_unbounded_retry() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: RetryResult<(), &str> =
            retry_with_backoff(&fast(None), &cancel, |_| async { Err("down") }).await;

        assert!(matches!(result, RetryResult::Cancelled));
    }

    #[test]
    fn test_delay_is_capped() {
        let config = fast(None);
        assert_eq!(config.next_delay(Duration::from_millis(4)), Duration::from_millis(5));
    }
}
