use anyhow::{anyhow, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded retry with backoff for transient remote-model failures
///
/// Single policy shared by every component that calls out to a model, so
/// retry behavior lives in one place instead of per-call-site loops. Each
/// attempt is bounded by `attempt_timeout`; a call that hangs without
/// erroring counts as a failed attempt like any other. The backoff doubles
/// after each failed attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 3)
    pub max_attempts: u32,

    /// Delay before the second attempt (default: 500ms); doubles per retry
    pub initial_backoff: Duration,

    /// Upper bound on one attempt (default: 30s)
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            attempt_timeout,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent
    ///
    /// The error from the final attempt is returned; earlier failures are
    /// logged only. An attempt still pending after `attempt_timeout` is
    /// abandoned and treated as a failure.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let error = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => anyhow!("{} timed out after {:?}", what, self.attempt_timeout),
            };

            if attempt < self.max_attempts {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    what, attempt, self.max_attempts, error, backoff
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            } else {
                warn!(
                    "{} failed on final attempt ({}/{}): {}",
                    what, attempt, self.max_attempts, error
                );
                return Err(error);
            }
        }
    }
}
