//! Persistence of order saga state.

use std::sync::Arc;

use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Version,
};

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

use super::{OrderError, OrderEvent, OrderId, OrderState};

/// Loads and checkpoints [`OrderState`] through an [`EventStore`].
///
/// Every change is appended with optimistic concurrency against the state's
/// current version, applied to the in-memory state, and followed by a
/// snapshot whenever the state's snapshot policy asks for one.
pub struct OrderRepository<S: EventStore> {
    store: Arc<S>,
}

impl<S: EventStore> Clone for OrderRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EventStore> OrderRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns the underlying event store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Rebuilds an order's state from its latest snapshot and the events
    /// recorded after it. Returns None if the order has no history.
    pub async fn load(&self, order_id: &OrderId) -> Result<Option<OrderState>, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(order_id).await?;

        let mut state = match snapshot {
            Some(snapshot) => restore_from_snapshot(snapshot)?,
            None => OrderState::default(),
        };

        for envelope in events {
            let event: OrderEvent = envelope.decode()?;
            state.apply(event);
            state.set_version(envelope.version);
        }

        if state.id().is_none() {
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// Loads an order, failing if it has no history.
    pub async fn load_existing(&self, order_id: &OrderId) -> Result<OrderState, DomainError> {
        self.load(order_id)
            .await?
            .ok_or_else(|| DomainError::OrderNotFound(order_id.clone()))
    }

    /// Persists `events` and applies them to `state`.
    ///
    /// Fails with a concurrency conflict if another writer appended to the
    /// order since `state` was loaded.
    pub async fn append(
        &self,
        state: &mut OrderState,
        events: Vec<OrderEvent>,
    ) -> Result<Version, DomainError> {
        let current_version = state.version();
        if events.is_empty() {
            return Ok(current_version);
        }

        let order_id = resolve_order_id(state, &events)?;
        let envelopes = build_envelopes(&order_id, state, current_version, &events)?;

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };
        let new_version = self.store.append(envelopes, options).await?;

        let mut snapshot_due = false;
        for event in events {
            snapshot_due |= state.should_snapshot(&event);
            state.apply(event);
        }
        state.set_version(new_version);

        if snapshot_due {
            let snapshot = Snapshot::from_state(
                order_id.clone(),
                OrderState::aggregate_type(),
                new_version,
                &*state,
            )?;
            self.store.save_snapshot(snapshot).await?;
            tracing::trace!(order_id = %order_id, version = %new_version, "checkpoint saved");
        }

        Ok(new_version)
    }

    /// Returns the order's full event history in version order.
    pub async fn history(&self, order_id: &OrderId) -> Result<Vec<EventEnvelope>, DomainError> {
        Ok(self.store.get_events_for_aggregate(order_id).await?)
    }

    /// Returns true if any history exists for the order.
    pub async fn exists(&self, order_id: &OrderId) -> Result<bool, DomainError> {
        Ok(self.store.aggregate_exists(order_id).await?)
    }
}

fn resolve_order_id(state: &OrderState, events: &[OrderEvent]) -> Result<OrderId, DomainError> {
    if let Some(id) = state.id() {
        return Ok(id.clone());
    }
    match events.first() {
        Some(OrderEvent::SagaStarted(data)) if !data.order_id.is_blank() => {
            Ok(data.order_id.clone())
        }
        _ => Err(OrderError::EmptyOrderId.into()),
    }
}

fn build_envelopes(
    order_id: &OrderId,
    state: &OrderState,
    current_version: Version,
    events: &[OrderEvent],
) -> Result<Vec<EventEnvelope>, DomainError> {
    let mut envelopes = Vec::with_capacity(events.len());
    let mut version = current_version;

    for event in events {
        version = version.next();
        let envelope = EventEnvelope::builder()
            .aggregate_id(order_id.clone())
            .aggregate_type(OrderState::aggregate_type())
            .event_type(event.event_type())
            .version(version)
            .metadata("stage", serde_json::json!(state.stage().as_str()))
            .payload(event)?
            .build()?;
        envelopes.push(envelope);
    }

    Ok(envelopes)
}

fn restore_from_snapshot(snapshot: Snapshot) -> Result<OrderState, DomainError> {
    let version = snapshot.version;
    let mut state: OrderState = snapshot.into_state()?;
    state.set_version(version);
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{LineItem, PaymentApproval, Stage};
    use event_store::{EventStoreError, InMemoryEventStore};

    fn repository() -> OrderRepository<InMemoryEventStore> {
        OrderRepository::new(Arc::new(InMemoryEventStore::new()))
    }

    async fn start(repo: &OrderRepository<InMemoryEventStore>, id: &str) -> OrderState {
        let mut state = OrderState::default();
        repo.append(
            &mut state,
            vec![OrderEvent::saga_started(
                OrderId::new(id),
                vec![LineItem::new("A", 2).unwrap()],
            )],
        )
        .await
        .unwrap();
        state
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let repo = repository();
        let mut state = start(&repo, "order-1").await;
        repo.append(
            &mut state,
            vec![
                OrderEvent::stage_entered(Stage::Enrichment),
                OrderEvent::stage_entered(Stage::Reserve),
                OrderEvent::stock_reserved(),
            ],
        )
        .await
        .unwrap();

        let loaded = repo
            .load(&OrderId::new("order-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.version(), Version::new(4));
        assert!(loaded.reserved());
    }

    #[tokio::test]
    async fn test_load_missing_order() {
        let repo = repository();
        assert!(repo.load(&OrderId::new("nope")).await.unwrap().is_none());
        assert!(matches!(
            repo.load_existing(&OrderId::new("nope")).await,
            Err(DomainError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_transition_writes_snapshot() {
        let repo = repository();
        let mut state = start(&repo, "order-1").await;
        let id = OrderId::new("order-1");
        assert!(repo.store().get_snapshot(&id).await.unwrap().is_none());

        repo.append(&mut state, vec![OrderEvent::stage_entered(Stage::Enrichment)])
            .await
            .unwrap();
        let snapshot = repo.store().get_snapshot(&id).await.unwrap().unwrap();
        assert_eq!(snapshot.version, Version::new(2));

        // Events after the snapshot are replayed on top of it
        repo.append(
            &mut state,
            vec![
                OrderEvent::stage_entered(Stage::Reserve),
                OrderEvent::stock_reserved(),
                OrderEvent::compensation_recorded("release_stock"),
            ],
        )
        .await
        .unwrap();
        let loaded = repo.load_existing(&id).await.unwrap();
        assert_eq!(loaded.pending_compensations(), ["release_stock".to_string()]);
        assert_eq!(loaded.version(), Version::new(5));
    }

    #[tokio::test]
    async fn test_stale_state_is_rejected() {
        let repo = repository();
        let mut state = start(&repo, "order-1").await;
        let mut stale = state.clone();

        repo.append(&mut state, vec![OrderEvent::stage_entered(Stage::Enrichment)])
            .await
            .unwrap();
        let result = repo
            .append(
                &mut stale,
                vec![OrderEvent::PaymentApproved(PaymentApproval::new("x"))],
            )
            .await;

        assert!(matches!(
            result,
            Err(DomainError::EventStore(
                EventStoreError::ConcurrencyConflict { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_events_without_identity_are_rejected() {
        let repo = repository();
        let mut state = OrderState::default();
        let result = repo.append(&mut state, vec![OrderEvent::stock_reserved()]).await;
        assert!(matches!(
            result,
            Err(DomainError::Order(OrderError::EmptyOrderId))
        ));
    }

    #[tokio::test]
    async fn test_history_records_stage_metadata() {
        let repo = repository();
        let mut state = start(&repo, "order-1").await;
        repo.append(&mut state, vec![OrderEvent::stage_entered(Stage::Enrichment)])
            .await
            .unwrap();
        repo.append(&mut state, vec![OrderEvent::stock_reserved()])
            .await
            .unwrap();

        let history = repo.history(&OrderId::new("order-1")).await.unwrap();
        let types: Vec<_> = history.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, ["SagaStarted", "StageEntered", "StockReserved"]);
        assert_eq!(history[2].metadata["stage"], "enrichment");
        assert!(repo.exists(&OrderId::new("order-1")).await.unwrap());
    }
}
