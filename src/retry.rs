// src/retry.rs
//! Exponential-backoff retry wrapper for fallible async operations.
//!
//! Generic over the operation's result type; retryability is decided by a
//! caller-supplied predicate so the policy stays independent of any one
//! error taxonomy.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt (total attempts = max_retries + 1).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    /// Scale each delay by a uniform factor in [0.5, 1.0] to avoid
    /// thundering-herd retries.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying on failures for which `is_retryable` returns true.
    /// Non-retryable failures propagate on first occurrence; the last error
    /// is returned unchanged once the retry budget is spent.
    pub async fn run<T, E, F, Fut>(
        &self,
        label: &str,
        is_retryable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_retries || !is_retryable(&err) {
                        return Err(err);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        target: "retry",
                        op = label,
                        attempt = attempt + 1,
                        error = %err,
                        delay_secs = delay.as_secs_f64(),
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        let mut secs = exp.min(self.max_delay.as_secs_f64());
        if self.jitter {
            secs *= rand::rng().random_range(0.5..=1.0);
        }
        Duration::from_secs_f64(secs)
    }
}
