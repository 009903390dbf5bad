//! Read-only view of a saga instance.

use domain::{LineItem, OrderState, Stage};
use tokio::sync::watch;

/// Publishes the latest state of a saga instance to readers.
///
/// Reads never block the saga, never call external operations and never
/// cause a transition. The last published state stays readable after the
/// instance terminates.
#[derive(Debug, Clone)]
pub struct StatusProjector {
    rx: watch::Receiver<OrderState>,
}

impl StatusProjector {
    /// Creates a projector and the sender the saga publishes through.
    pub fn channel(initial: OrderState) -> (watch::Sender<OrderState>, Self) {
        let (tx, rx) = watch::channel(initial);
        (tx, Self { rx })
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> OrderState {
        self.rx.borrow().clone()
    }

    /// Returns the current cart in insertion order.
    pub fn items(&self) -> Vec<LineItem> {
        self.rx.borrow().items().to_vec()
    }

    pub fn stage(&self) -> Stage {
        self.rx.borrow().stage()
    }

    /// Waits until the state satisfies `predicate` and returns it.
    ///
    /// If the saga finishes without ever satisfying it, returns the final
    /// state.
    pub async fn wait_for(&self, mut predicate: impl FnMut(&OrderState) -> bool) -> OrderState {
        let mut rx = self.rx.clone();
        let matched = match rx.wait_for(|state| predicate(state)).await {
            Ok(state) => Some(state.clone()),
            Err(_) => None,
        };
        matched.unwrap_or_else(|| self.snapshot())
    }

    /// Waits until the instance reaches `stage` or terminates.
    pub async fn wait_for_stage(&self, stage: Stage) -> OrderState {
        self.wait_for(|state| state.stage() == stage || state.is_terminal())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Aggregate, OrderEvent, OrderId};

    fn started() -> OrderState {
        let mut state = OrderState::default();
        state.apply(OrderEvent::saga_started(
            OrderId::new("order-1"),
            vec![LineItem::new("A", 2).unwrap()],
        ));
        state
    }

    #[test]
    fn snapshot_reflects_latest_publish() {
        let (tx, projector) = StatusProjector::channel(started());
        assert_eq!(projector.stage(), Stage::Start);

        let mut next = projector.snapshot();
        next.apply(OrderEvent::stage_entered(Stage::Enrichment));
        tx.send_replace(next);

        assert_eq!(projector.stage(), Stage::Enrichment);
        assert_eq!(projector.items(), [LineItem::new("A", 2).unwrap()]);
    }

    #[test]
    fn snapshot_survives_publisher_drop() {
        let (tx, projector) = StatusProjector::channel(started());
        drop(tx);
        assert_eq!(
            projector.snapshot().order_id().map(OrderId::as_str),
            Some("order-1")
        );
    }

    #[tokio::test]
    async fn wait_for_stage_returns_matching_state() {
        let (tx, projector) = StatusProjector::channel(started());
        let waiter = {
            let projector = projector.clone();
            tokio::spawn(async move { projector.wait_for_stage(Stage::Reserve).await })
        };

        let mut next = projector.snapshot();
        next.apply(OrderEvent::stage_entered(Stage::Enrichment));
        next.apply(OrderEvent::stage_entered(Stage::Reserve));
        tx.send_replace(next);

        assert_eq!(waiter.await.unwrap().stage(), Stage::Reserve);
    }

    #[tokio::test]
    async fn wait_for_returns_final_state_when_publisher_drops() {
        let (tx, projector) = StatusProjector::channel(started());
        drop(tx);
        let state = projector.wait_for(|s| s.stage() == Stage::Payment).await;
        assert_eq!(state.stage(), Stage::Start);
    }
}
