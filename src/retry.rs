use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Fixed attempt budget with a linearly growing pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

/// Outcome of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum Attempt<T, E> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { error: E, attempts: u32 },
}

impl RetryPolicy {
    /// Wait after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Runs `operation` until it succeeds or the attempts run out. The
    /// `on_failure` hook sees every failure that will be retried, with the
    /// delay about to be slept.
    pub async fn run<T, E, F, Fut, H>(&self, mut operation: F, mut on_failure: H) -> Attempt<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(u32, &E, Duration),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation(attempt).await {
                Ok(value) => {
                    return Attempt::Succeeded {
                        value,
                        attempts: attempt,
                    }
                }
                Err(error) if attempt >= max_attempts => {
                    return Attempt::Exhausted {
                        error,
                        attempts: attempt,
                    }
                }
                Err(error) => {
                    let delay = self.delay_after(attempt);
                    on_failure(attempt, &error, delay);
                    sleep(delay).await;
                }
            }
        }
    }
}
