//! Generic retry driver with identity rotation and linear backoff.

use super::identity::{IdentityPool, IdentityProfile};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How an operation is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// After failed attempt n (1-based) the driver waits `base_delay * n`.
    pub base_delay: Duration,
    pub identities: IdentityPool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base_delay: Duration::from_secs(2), identities: IdentityPool::default() }
    }
}

/// Context handed to each attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    pub profile_index: usize,
    pub profile: IdentityProfile,
}

/// The retry budget ran out without a success.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("gave up after {attempts} attempts: {last_error}")]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: String,
}

impl RetryPolicy {
    /// Delay inserted after failed attempt `number` (1-based).
    pub fn delay_after(&self, number: u32) -> Duration {
        self.base_delay * number
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// Attempt n runs under profile `(n - 1) mod pool_size`. No delay follows
    /// the final attempt.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for number in 1..=max_attempts {
            let profile_index = self.identities.index_for(number - 1);
            let attempt =
                Attempt { number, profile_index, profile: self.identities.profile_for(number - 1).clone() };
            let identity = attempt.profile.name.clone();

            match op(attempt).await {
                Ok(value) => {
                    if number > 1 {
                        tracing::info!(label, attempt = number, identity = %identity, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    tracing::warn!(label, attempt = number, max_attempts, identity = %identity, error = %e, "attempt failed");
                    last_error = e.to_string();
                }
            }

            if number < max_attempts {
                tokio::time::sleep(self.delay_after(number)).await;
            }
        }

        Err(RetryExhausted { attempts: max_attempts, last_error })
    }
}
