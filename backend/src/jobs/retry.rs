use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Fixed-backoff retry policy. `max_attempts` counts the first try.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt; failures wait for the next scheduled run.
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }
}

/// Runs `op` until it succeeds or the policy is exhausted, sleeping
/// `backoff` between attempts. Returns the last error on exhaustion.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(label: &'static str, policy: RetryPolicy, mut op: F) -> anyhow::Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.max_attempts => {
                warn!(
                    task = label,
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = u64::try_from(policy.backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "attempt failed; retrying"
                );
                tokio::time::sleep(policy.backoff).await;
                attempt += 1;
            }
            Err(e) => {
                error!(
                    task = label,
                    attempts = attempt,
                    error = ?e,
                    "retries exhausted"
                );
                return Err(e);
            }
        }
    }
}
