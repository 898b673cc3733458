//! Timeout and retry policy for payment provider calls.
//!
//! Each attempt is bounded by the per-call timeout. Retryable failures are
//! retried with exponential backoff until the attempt ceiling; permanent
//! failures return immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use crate::config::PaymentConfig;
use crate::ports::PaymentError;

/// How provider calls are bounded and retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub call_timeout: Duration,
    /// Attempts including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PaymentConfig) -> Self {
        Self {
            call_timeout: config.request_timeout(),
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
        }
    }

    /// Runs `call` under this policy. `operation` names the call in logs.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T, PaymentError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PaymentError>>,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let result = match timeout(self.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => Err(PaymentError::timeout(format!(
                    "{} timed out after {:?}",
                    operation, self.call_timeout
                ))),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(err) if !err.retryable || attempt >= self.max_attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        code = %err.code,
                        retryable = err.retryable,
                        "Payment provider call failed"
                    );
                    return Err(err);
                }
                Err(err) => {
                    tracing::debug!(
                        operation,
                        attempt,
                        code = %err.code,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retrying payment provider call"
                    );
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
            }
        }
    }
}
