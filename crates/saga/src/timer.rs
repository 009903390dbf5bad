//! Deadline timers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Clock and wake-up source for business deadlines.
///
/// Deadlines are absolute timestamps so that a resumed instance fires at the
/// originally recorded time instead of restarting its window.
#[async_trait]
pub trait DurableTimer: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Completes once `deadline` has passed. Returns at once if it already has.
    async fn sleep_until(&self, deadline: DateTime<Utc>);
}

/// Timer backed by the wall clock and the tokio timer wheel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl DurableTimer for TokioTimer {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        if let Ok(remaining) = (deadline - Utc::now()).to_std() {
            tokio::time::sleep(remaining).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn sleeps_until_deadline() {
        let timer = TokioTimer;
        let start = tokio::time::Instant::now();

        timer
            .sleep_until(timer.now() + chrono::Duration::minutes(15))
            .await;

        assert!(start.elapsed() >= Duration::from_secs(14 * 60));
    }

    #[tokio::test]
    async fn past_deadline_returns_immediately() {
        let timer = TokioTimer;
        tokio::time::timeout(
            Duration::from_secs(1),
            timer.sleep_until(timer.now() - chrono::Duration::minutes(1)),
        )
        .await
        .unwrap();
    }
}
