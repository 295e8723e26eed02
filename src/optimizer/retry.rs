//! Bounded retry for external calls.
//!
//! Only transient failures (rate-limited, timeout) are retried; terminal
//! errors propagate on the first occurrence. Backoff is exponential with a
//! bounded deterministic jitter, and delays are genuine non-blocking sleeps.

use std::time::Duration;

use tracing::warn;

use super::error::CollaboratorError;

/// Retry schedule for one class of external operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first (so `3` = initial + 2 retries).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Maximum extra milliseconds spread onto each delay to decorrelate
    /// concurrent retriers. 0 disables jitter.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given 1-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        if self.jitter_ms == 0 {
            return base;
        }
        // Multiplicative-hash jitter keyed on the attempt number; spreads
        // concurrent retriers without pulling in an RNG.
        let jitter = (attempt as u64).wrapping_mul(2654435761) % (self.jitter_ms + 1);
        base + Duration::from_millis(jitter)
    }
}

/// Runs `operation` under the policy. Returns the value, or the last error
/// together with the number of attempts made.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: F,
) -> Result<T, (u32, CollaboratorError)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CollaboratorError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err((attempt, error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn quick_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(100),
            jitter_ms: 0,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            jitter_ms: 0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(4), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let policy = RetryPolicy {
            jitter_ms: 100,
            ..quick_policy()
        };
        for attempt in 1..20 {
            let delta = policy.delay_for(attempt).saturating_sub(
                RetryPolicy {
                    jitter_ms: 0,
                    ..policy
                }
                .delay_for(attempt),
            );
            assert!(delta <= Duration::from_millis(100));
        }
    }

    #[tokio::test]
    async fn test_transient_errors_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&quick_policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CollaboratorError::Timeout)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_terminal_error_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&quick_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CollaboratorError::Malformed {
                    reason: "bad".into(),
                })
            }
        })
        .await;

        let (attempts, error) = result.unwrap_err();
        assert_eq!(attempts, 1);
        assert!(!error.is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let result: Result<(), _> = with_retry(&quick_policy(), "test", || async {
            Err(CollaboratorError::RateLimited)
        })
        .await;

        let (attempts, error) = result.unwrap_err();
        assert_eq!(attempts, 3);
        assert!(matches!(error, CollaboratorError::RateLimited));
    }
}
