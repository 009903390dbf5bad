//! Tunables for saga instances.

use std::time::Duration;

use crate::invoker::{OperationInvoker, RetryPolicy};

/// Settings shared by every saga a coordinator runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SagaOptions {
    /// How long an order waits for approval before it is cancelled.
    pub approval_window: Duration,
    /// Retry policy applied to every external operation.
    pub retry_policy: RetryPolicy,
    /// Per-attempt timeout for external operations.
    pub operation_timeout: Duration,
    /// Recipient of order confirmations.
    pub notification_email: String,
}

impl Default for SagaOptions {
    fn default() -> Self {
        Self {
            approval_window: Duration::from_secs(15 * 60),
            retry_policy: RetryPolicy::default(),
            operation_timeout: Duration::from_secs(30),
            notification_email: "customer@example.com".to_string(),
        }
    }
}

impl SagaOptions {
    pub fn with_approval_window(mut self, window: Duration) -> Self {
        self.approval_window = window;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Builds the invoker used for every external operation.
    pub fn invoker(&self) -> OperationInvoker {
        OperationInvoker::new(self.retry_policy.clone(), self.operation_timeout)
    }
}
