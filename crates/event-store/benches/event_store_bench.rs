use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{EventEnvelope, EventStore, InMemoryEventStore, Version};

fn make_event(aggregate_id: AggregateId, sequence: u64) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Account")
        .event_type("NameSet")
        .sequence(sequence)
        .payload_raw(serde_json::json!({
            "type": "NameSet",
            "data": { "first_name": "Darren", "last_name": "Cauthon" }
        }))
        .build()
}

fn bench_append_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = AggregateId::new();
                store
                    .append(id, Version::initial(), vec![make_event(id, 0)])
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_append_batch_10(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_batch_10", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let id = AggregateId::new();
                let events: Vec<EventEnvelope> = (0..10).map(|s| make_event(id, s)).collect();
                store.append(id, Version::initial(), events).await.unwrap();
            });
        });
    });
}

fn bench_load_100_events(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let id = AggregateId::new();
    rt.block_on(async {
        let events: Vec<EventEnvelope> = (0..100).map(|s| make_event(id, s)).collect();
        store.append(id, Version::initial(), events).await.unwrap();
    });

    c.bench_function("event_store/load_100_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.load_events(id).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_append_single_event,
    bench_append_batch_10,
    bench_load_100_events
);
criterion_main!(benches);
