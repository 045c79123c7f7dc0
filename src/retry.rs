use std::future::Future;
use std::time::Duration;

use rand::Rng as _;

/// Bounded retry with exponential backoff, used for calls the remote API may
/// throttle. The jitter keeps repeated runs from hammering the quota window
/// at the same instant.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = if self.base_delay.is_zero() {
            0
        } else {
            rand::thread_rng().gen_range(0..self.base_delay.as_millis() as u64)
        };
        exp + Duration::from_millis(jitter_ms)
    }
}

/// Run `operation`, retrying while `retryable` says the error is transient.
/// Non-transient errors are returned immediately; transient ones are returned
/// once the retry budget is spent.
pub async fn with_backoff<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    retryable: R,
    operation: F,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !retryable(&e) || attempt >= policy.max_retries {
                    return Err(e);
                }
                let delay = policy.delay_for(attempt);
                log::warn!(
                    "transient error (attempt {n} of {total}), retrying in {secs:.1}s: {e}",
                    n = attempt + 1,
                    total = policy.max_retries + 1,
                    secs = delay.as_secs_f32(),
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
