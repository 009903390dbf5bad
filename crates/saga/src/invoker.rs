//! Bounded retries for external operations.

use std::future::Future;
use std::time::Duration;

use crate::error::{ErrorKind, OperationError};

/// Retry behaviour for one external operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Multiplier applied to the delay after every retry.
    pub backoff_coefficient: f64,
    /// Upper bound on any single delay.
    pub maximum_interval: Duration,
    /// Total attempts including the first call. Zero is treated as one.
    pub maximum_attempts: u32,
    /// Error kinds that stop retrying immediately.
    pub non_retryable: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(30),
            maximum_attempts: 5,
            non_retryable: vec![ErrorKind::Permanent, ErrorKind::Validation],
        }
    }
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    pub fn no_retry() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_maximum_attempts(mut self, attempts: u32) -> Self {
        self.maximum_attempts = attempts;
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Returns the delay before retry `retry` (1-based):
    /// `min(initial * coefficient^(retry - 1), maximum)`.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = secs.min(self.maximum_interval.as_secs_f64()).max(0.0);
        Duration::from_secs_f64(capped)
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        !self.non_retryable.contains(&kind)
    }

    fn attempts(&self) -> u32 {
        self.maximum_attempts.max(1)
    }
}

/// Calls external operations with a per-attempt timeout and a retry policy.
///
/// An attempt that exceeds the timeout counts as a transient failure. The
/// invoker never makes more than `maximum_attempts` calls and gives up at
/// once on a non-retryable error kind.
#[derive(Debug, Clone)]
pub struct OperationInvoker {
    policy: RetryPolicy,
    timeout: Duration,
}

impl Default for OperationInvoker {
    fn default() -> Self {
        Self::new(RetryPolicy::default(), Duration::from_secs(30))
    }
}

impl OperationInvoker {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Self {
        Self { policy, timeout }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Invokes `call` until it succeeds, fails with a non-retryable error or
    /// runs out of attempts. Returns the last error on failure.
    pub async fn invoke<T, F, Fut>(
        &self,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, OperationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, OperationError>>,
    {
        let max_attempts = self.policy.attempts();
        let mut attempt = 1;

        loop {
            metrics::counter!("operation_attempts_total", "operation" => operation).increment(1);

            let error = match tokio::time::timeout(self.timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(error)) => error,
                Err(_) => OperationError::transient(format!(
                    "{operation} timed out after {:?}",
                    self.timeout
                )),
            };

            if !self.policy.is_retryable(error.kind) {
                tracing::warn!(
                    operation,
                    attempt,
                    kind = %error.kind,
                    %error,
                    "operation failed, not retryable"
                );
                return Err(error);
            }
            if attempt >= max_attempts {
                tracing::warn!(operation, attempt, %error, "operation failed, retries exhausted");
                return Err(error);
            }

            let delay = self.policy.delay_for_retry(attempt);
            tracing::debug!(operation, attempt, ?delay, %error, "operation failed, retrying");
            metrics::counter!("operation_retries_total", "operation" => operation).increment(1);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
