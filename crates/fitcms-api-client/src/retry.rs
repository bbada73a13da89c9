//! Exponential backoff for rate-limited reads.

use fitcms_core::{ClientConfig, MediaResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::gate::RequestGate;

/// Retry schedule for idempotent reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to every delay.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.retry_max,
            initial_delay: config.retry_initial_delay(),
            max_jitter: config.retry_max_jitter(),
        }
    }

    /// Delay before retry number `retry` (1-based): `initial * 2^retry`, without jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        self.initial_delay.saturating_mul(2_u32.saturating_pow(retry))
    }

    pub fn delay_for(&self, retry: u32) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        self.base_delay(retry) + jitter
    }
}

/// Run `operation` through `gate`, retrying only rate-limited failures.
///
/// Each attempt occupies a gate slot only while it executes; the backoff
/// sleep happens outside the gate. After `max_retries` retries the last
/// error is returned unchanged.
pub async fn with_retry<F, Fut, T>(
    gate: &RequestGate,
    policy: &RetryPolicy,
    mut operation: F,
) -> MediaResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MediaResult<T>>,
{
    let mut retries = 0;
    loop {
        match gate.submit(|| operation()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() && retries < policy.max_retries => {
                retries += 1;
                let delay = policy.delay_for(retries);
                tracing::warn!(
                    attempt = retries,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_rate_limited() {
                    tracing::warn!(retries = retries, "Rate limit retries exhausted");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitcms_core::MediaError;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn rate_limited() -> MediaError {
        MediaError::from_status(429, Some("Too many requests".to_string()))
    }

    #[test]
    fn test_base_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.base_delay(2), Duration::from_millis(4000));
        assert_eq!(policy.base_delay(3), Duration::from_millis(8000));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay < Duration::from_millis(2500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_k_rate_limits_with_increasing_delays() {
        let gate = RequestGate::new(2);
        let policy = RetryPolicy::default();
        let attempts = Mutex::new(Vec::<Instant>::new());

        let result = with_retry(&gate, &policy, || {
            let attempts = &attempts;
            async move {
                let mut attempts = attempts.lock().unwrap();
                attempts.push(Instant::now());
                if attempts.len() <= 2 {
                    Err(rate_limited())
                } else {
                    Ok("media")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("media"));
        let attempts = attempts.into_inner().unwrap();
        assert_eq!(attempts.len(), 3);
        let first_gap = attempts[1] - attempts[0];
        let second_gap = attempts[2] - attempts[1];
        assert!(first_gap >= Duration::from_millis(2000));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_return_original_error() {
        let gate = RequestGate::new(2);
        let policy = RetryPolicy::default();
        let calls = Mutex::new(0);

        let result: MediaResult<()> = with_retry(&gate, &policy, || {
            *calls.lock().unwrap() += 1;
            async { Err(rate_limited()) }
        })
        .await;

        assert_eq!(result, Err(rate_limited()));
        assert_eq!(*calls.lock().unwrap(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let gate = RequestGate::new(2);
        let policy = RetryPolicy::default();
        let calls = Mutex::new(0);
        let started = Instant::now();

        let result: MediaResult<()> = with_retry(&gate, &policy, || {
            *calls.lock().unwrap() += 1;
            async { Err(MediaError::from_status(500, None)) }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_sleep_does_not_hold_a_slot() {
        let gate = RequestGate::new(1);
        let policy = RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_millis(100),
            max_jitter: Duration::ZERO,
        };
        let calls = Mutex::new(0);

        let retried = with_retry(&gate, &policy, || {
            let first = {
                let mut calls = calls.lock().unwrap();
                *calls += 1;
                *calls == 1
            };
            async move {
                if first {
                    Err(rate_limited())
                } else {
                    Ok(())
                }
            }
        });
        let started = Instant::now();
        let other = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            gate.submit(|| async { started.elapsed() }).await
        };

        let (retried, other_started_after) = tokio::join!(retried, other);
        assert!(retried.is_ok());
        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(other_started_after < Duration::from_millis(200));
    }
}
