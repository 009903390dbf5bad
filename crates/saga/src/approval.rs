//! Multi-source wait used while an order awaits payment approval.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::signals::{OrderSignal, SignalReceiver};
use crate::timer::DurableTimer;

/// One event consumed by the approval wait.
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalEvent {
    /// An inbound signal, in arrival order.
    Signal(OrderSignal),
    /// The approval deadline passed.
    DeadlineExpired,
}

/// Waits on the signal queue and the approval deadline.
///
/// Each call to [`next_event`](Self::next_event) suspends until exactly one
/// source is ready and returns that event. When a signal and the deadline are
/// ready together the signal wins. Once every sender is gone only the
/// deadline is awaited.
pub struct ApprovalLoop {
    signals: SignalReceiver,
    timer: Arc<dyn DurableTimer>,
    signals_open: bool,
}

impl ApprovalLoop {
    pub fn new(signals: SignalReceiver, timer: Arc<dyn DurableTimer>) -> Self {
        Self {
            signals,
            timer,
            signals_open: true,
        }
    }

    pub async fn next_event(&mut self, deadline: DateTime<Utc>) -> ApprovalEvent {
        let mut expiry = self.timer.sleep_until(deadline);

        loop {
            if !self.signals_open {
                expiry.await;
                return ApprovalEvent::DeadlineExpired;
            }

            tokio::select! {
                biased;

                signal = self.signals.recv() => match signal {
                    Some(signal) => return ApprovalEvent::Signal(signal),
                    None => {
                        tracing::debug!("signal senders dropped, waiting on deadline only");
                        self.signals_open = false;
                    }
                },
                () = &mut expiry => return ApprovalEvent::DeadlineExpired,
            }
        }
    }
}
