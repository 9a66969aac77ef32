//! Retry policies applied by clients while (re)connecting.

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Default fixed backoff between connection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(300);

/// How a client retries a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry indefinitely with a fixed delay between attempts.
    Forever { interval: Duration },
    /// Retry up to `max_retries` times with a fixed delay between attempts.
    Bounded { max_retries: u32, interval: Duration },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::forever(DEFAULT_RETRY_INTERVAL)
    }
}

impl RetryPolicy {
    /// Indefinite retry with a fixed interval.
    pub fn forever(interval: Duration) -> Self {
        Self::Forever { interval }
    }

    /// Bounded retry with a fixed interval.
    pub fn bounded(max_retries: u32, interval: Duration) -> Self {
        Self::Bounded {
            max_retries,
            interval,
        }
    }

    /// The fixed delay between attempts.
    pub fn interval(&self) -> Duration {
        match self {
            Self::Forever { interval } | Self::Bounded { interval, .. } => *interval,
        }
    }

    /// Delay before retry number `retry` (zero-based), or `None` once exhausted.
    pub fn delay_for(&self, retry: u32) -> Option<Duration> {
        match self {
            Self::Forever { interval } => Some(*interval),
            Self::Bounded {
                max_retries,
                interval,
            } => (retry < *max_retries).then_some(*interval),
        }
    }

    /// Runs `op` until it succeeds, retrying transient failures per policy.
    ///
    /// Only `Unavailable` and `Connection` errors are retried; anything else
    /// is returned immediately.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err @ (StoreError::Unavailable { .. } | StoreError::Connection { .. })) => {
                    match self.delay_for(retry) {
                        Some(delay) => {
                            retry += 1;
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
