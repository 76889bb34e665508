use std::time::Duration;

use async_trait::async_trait;

use crate::provider::ProviderError;

/// What the resolver should do after a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait for the backoff and try the same query again.
    Retry,
    /// Cool down, then move on to the next candidate query.
    AbandonCandidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub service_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(3),
            service_cooldown: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn classify(&self, err: &ProviderError) -> RetryDecision {
        match err {
            ProviderError::TimedOut => RetryDecision::Retry,
            ProviderError::Service(_) | ProviderError::Rejected(_) => {
                RetryDecision::AbandonCandidate
            }
        }
    }

    /// Wait after the given (1-based) timed-out attempt: 3s, 6s, 9s, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt.max(1))
    }

    pub fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Suspension point for rate limiting and backoff, swappable in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    /// Records requested sleeps without waiting.
    #[derive(Clone, Default)]
    pub struct RecordingSleeper {
        slept: Arc<Mutex<Vec<Duration>>>,
    }

    impl RecordingSleeper {
        pub fn slept(&self) -> Vec<Duration> {
            self.slept.lock().clone()
        }
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().push(duration);
        }
    }
}
