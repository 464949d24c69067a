//! Timeouts and bounded retries for external I/O.
//!
//! Every call that leaves the process (dataset fetch, tracking store writes)
//! goes through an [`IoPolicy`], so a hung backend surfaces as
//! [`Error::Timeout`] instead of blocking the pipeline.

use std::future::Future;
use std::time::Duration;

use crate::{Error, Result};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of attempts for retried calls.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry; doubled on each further retry.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

/// Timeout and retry settings for one class of I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoPolicy {
    timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
}

impl Default for IoPolicy {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl IoPolicy {
    /// Create a policy. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(timeout: Duration, max_attempts: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Total attempts made by [`IoPolicy::retrying`].
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Initial retry delay.
    #[must_use]
    pub const fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `fut` once, failing with [`Error::Timeout`] if it does not finish
    /// within the policy timeout.
    ///
    /// # Errors
    ///
    /// Returns the future's own error, or [`Error::Timeout`].
    pub async fn timed<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .unwrap_or_else(|_| {
                Err(Error::Timeout {
                    operation: operation.to_string(),
                    after: self.timeout,
                })
            })
    }

    /// Run the future produced by `call` under [`IoPolicy::timed`], retrying
    /// transient failures with exponential backoff.
    ///
    /// Non-transient errors are returned immediately.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted.
    pub async fn retrying<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = self.backoff;
        let mut attempt = 1;
        loop {
            match self.timed(operation, call()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Transient failure, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
