//! Retry wrapper for outbound provider calls
//!
//! Providers pass every network exchange through [`retry`] at the call
//! site. The wrapper does not look at the error: any `Err` is retried
//! until the attempt budget is spent, with a fixed delay in between.
//!
//! ```rust,ignore
//! let body = retry(&self.retry_policy, "DescribeDomainRecords", || async {
//!     self.send(&params).await
//! })
//! .await?;
//! ```
//!
//! Call volume is at most a handful of requests per reconciliation cycle,
//! so the delay is fixed: no jitter, no exponential growth.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{DEFAULT_RETRY_BACKOFF_MS, DEFAULT_RETRY_MAX_ATTEMPTS};

/// Bounded attempts with a fixed backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    backoff: Duration,
}

impl RetryPolicy {
    /// Create a policy; `max_attempts` of zero is treated as one attempt
    pub fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Total attempts, including the first
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay between consecutive attempts
    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    /// 5 attempts, 5 seconds apart
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        )
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted
///
/// Each failed attempt is logged with its attempt number. After the last
/// attempt the error from that attempt is returned as-is.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;
    loop {
        debug!("{} (attempt {}/{})", operation, attempt, policy.max_attempts);

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation, attempt, policy.max_attempts, e, policy.backoff
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    "{} failed (attempt {}/{}): {}; giving up",
                    operation, attempt, policy.max_attempts, e
                );
                return Err(e);
            }
        }
    }
}
