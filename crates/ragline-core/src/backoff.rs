// Exponential backoff with full jitter
//
// Decision: a plain loop carrying the attempt count, not recursion
// Decision: the policy knows nothing about the wrapped operation; callers
// choose max_attempts based on whether the call is safely retryable

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retry policy for fallible async operations.
///
/// After the Nth failure (1-based) the delay before the next attempt is
/// `min(initial_delay * 2^N, max_delay)`, scaled by a uniform factor in
/// `[0.5, 1.5)` when jitter is enabled. The last error is propagated
/// unchanged once attempts are exhausted.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10_000),
            max_delay: Duration::from_millis(30_000),
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration, jitter: bool) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            jitter,
        }
    }

    /// Single attempt, fail-fast. For calls that must not be duplicated.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Capped exponential delay after the given 1-based failure count
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.max_delay)
    }

    /// Scale a delay by a uniform factor in `[0.5, 1.5)`
    fn jittered(delay: Duration) -> Duration {
        delay.mul_f64(0.5 + rand::random::<f64>())
    }

    /// Drive `op` until it succeeds or `max_attempts` failures accumulate
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    warn!(attempt = attempt, error = %error, "Attempt failed");

                    if attempt >= self.max_attempts {
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    let sleep_for = if self.jitter {
                        Self::jittered(delay)
                    } else {
                        delay
                    };
                    tokio::time::sleep(sleep_for).await;
                }
            }
        }
    }
}
