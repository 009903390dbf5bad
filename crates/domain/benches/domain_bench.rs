use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use domain::{
    Aggregate, LineItem, OrderEvent, OrderId, OrderRepository, OrderState, PaymentApproval, Stage,
};
use event_store::InMemoryEventStore;

/// A full happy-path history with `extra_items` items added while waiting.
fn happy_path_events(extra_items: usize) -> Vec<OrderEvent> {
    let mut events = vec![
        OrderEvent::saga_started(
            OrderId::new("order-bench"),
            vec![LineItem::new("SKU-A", 2).unwrap()],
        ),
        OrderEvent::stage_entered(Stage::Enrichment),
        OrderEvent::version_marker("order-workflow-v2", 2),
        OrderEvent::stage_entered(Stage::Reserve),
        OrderEvent::stock_reserved(),
        OrderEvent::compensation_recorded("release_stock"),
        OrderEvent::stage_entered(Stage::AwaitingApproval),
    ];
    for i in 0..extra_items {
        events.push(OrderEvent::LineItemAdded(
            LineItem::new(format!("SKU-{i}"), 1).unwrap(),
        ));
    }
    events.extend([
        OrderEvent::PaymentApproved(PaymentApproval::new("bench")),
        OrderEvent::stage_entered(Stage::Payment),
        OrderEvent::payment_charged(),
        OrderEvent::compensation_recorded("refund_payment"),
        OrderEvent::stage_entered(Stage::StatusUpdate),
        OrderEvent::stage_entered(Stage::Notify),
        OrderEvent::saga_completed(),
    ]);
    events
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain/replay");

    for extra in [0usize, 10, 100] {
        let events = happy_path_events(extra);
        group.bench_with_input(BenchmarkId::from_parameter(extra), &events, |b, events| {
            b.iter(|| {
                let mut state = OrderState::default();
                state.apply_events(events.iter().cloned());
                state
            });
        });
    }

    group.finish();
}

fn bench_load_with_snapshot(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let repo = OrderRepository::new(Arc::new(InMemoryEventStore::new()));
    let order_id = OrderId::new("order-bench");

    rt.block_on(async {
        let mut state = OrderState::default();
        for event in happy_path_events(50) {
            repo.append(&mut state, vec![event]).await.unwrap();
        }
    });

    c.bench_function("domain/load_with_snapshot", |b| {
        b.iter(|| {
            rt.block_on(async { repo.load(&order_id).await.unwrap() });
        });
    });
}

criterion_group!(benches, bench_replay, bench_load_with_snapshot);
criterion_main!(benches);
