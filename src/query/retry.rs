//! Retry with exponential backoff
//!
//! Only [`ApiError::is_transient`] failures are retried. The delay before
//! retry `n` (0-based) is `min(base * 2^n, max)`.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::key::ResourceKind;
use super::metrics;
use crate::error::{ApiError, ApiResult};

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use cvforge::query::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(0), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    /// assert_eq!(policy.delay_for(10), Duration::from_secs(30));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        1u32.checked_shl(retry)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Whether `error` should be retried after `retries_done` retries.
    pub fn should_retry(&self, error: &ApiError, retries_done: u32) -> bool {
        retries_done < self.max_retries && error.is_transient()
    }
}

/// Runs `op` until it succeeds, fails permanently, or the retry budget is
/// spent. The last error is returned.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    kind: ResourceKind,
    mut op: F,
) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut retries = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.should_retry(&e, retries) => {
                let delay = policy.delay_for(retries);
                warn!(
                    kind = kind.as_str(),
                    attempt = retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Fetch failed, retrying"
                );
                metrics::record_retry(kind);
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
