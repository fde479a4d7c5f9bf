use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Version,
    store::{EventStore, validate_append},
};

type Stream = Arc<Mutex<Vec<EventEnvelope>>>;

/// In-memory event store.
///
/// Each aggregate's stream sits behind its own mutex, so appends to different
/// aggregates proceed independently while appends to the same aggregate are
/// serialized and version-checked. The outer map lock is only held long
/// enough to find or create a stream.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<RwLock<HashMap<AggregateId, Stream>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored across all streams.
    pub async fn event_count(&self) -> usize {
        let streams: Vec<Stream> = self.streams.read().await.values().cloned().collect();
        let mut count = 0;
        for stream in streams {
            count += stream.lock().await.len();
        }
        count
    }

    async fn stream(&self, aggregate_id: AggregateId) -> Option<Stream> {
        self.streams.read().await.get(&aggregate_id).cloned()
    }

    async fn stream_or_create(&self, aggregate_id: AggregateId) -> Stream {
        if let Some(stream) = self.stream(aggregate_id).await {
            return stream;
        }
        let mut streams = self.streams.write().await;
        streams.entry(aggregate_id).or_default().clone()
    }
}

fn conflict(aggregate_id: AggregateId, expected: Version, actual: Version) -> EventStoreError {
    metrics::counter!("event_store_concurrency_conflicts").increment(1);
    tracing::warn!(%actual, "stale expected version");
    EventStoreError::ConcurrencyConflict {
        aggregate_id,
        expected,
        actual,
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_append(aggregate_id, expected_version, &events)?;

        // Only a first append may create the stream.
        let stream = if expected_version == Version::initial() {
            Some(self.stream_or_create(aggregate_id).await)
        } else {
            self.stream(aggregate_id).await
        };
        let Some(stream) = stream else {
            return Err(conflict(aggregate_id, expected_version, Version::initial()));
        };
        let mut stream = stream.lock().await;

        let actual = Version::from(stream.len());
        if actual != expected_version {
            return Err(conflict(aggregate_id, expected_version, actual));
        }

        metrics::counter!("event_store_events_appended").increment(events.len() as u64);
        stream.extend(events);

        Ok(Version::from(stream.len()))
    }

    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        match self.stream(aggregate_id).await {
            Some(stream) => Ok(stream.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn current_version(&self, aggregate_id: AggregateId) -> Result<Version> {
        match self.stream(aggregate_id).await {
            Some(stream) => Ok(Version::from(stream.lock().await.len())),
            None => Ok(Version::initial()),
        }
    }

    async fn load_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let streams: Vec<Stream> = self.streams.read().await.values().cloned().collect();

        let mut events = Vec::new();
        for stream in streams {
            let stream = stream.lock().await;
            events.extend(stream.iter().filter(|e| e.event_type == event_type).cloned());
        }
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.sequence.cmp(&b.sequence))
        });

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventStoreExt;

    fn create_test_event(aggregate_id: AggregateId, sequence: u64, event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("TestAggregate")
            .event_type(event_type)
            .sequence(sequence)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    #[tokio::test]
    async fn append_to_new_stream() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let version = store
            .append(
                aggregate_id,
                Version::initial(),
                vec![create_test_event(aggregate_id, 0, "Created")],
            )
            .await
            .unwrap();

        assert_eq!(version, Version::new(1));
        assert_eq!(store.load_events(aggregate_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_append_to_unknown_stream_leaves_nothing_behind() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let result = store
            .append(
                aggregate_id,
                Version::new(2),
                vec![create_test_event(aggregate_id, 2, "Renamed")],
            )
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { actual, .. }) if actual == Version::initial()
        ));
        assert!(store.streams.read().await.is_empty());
        assert!(!store.aggregate_exists(aggregate_id).await.unwrap());
    }

    #[tokio::test]
    async fn append_batch_continues_sequence() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                aggregate_id,
                Version::initial(),
                vec![
                    create_test_event(aggregate_id, 0, "Event1"),
                    create_test_event(aggregate_id, 1, "Event2"),
                ],
            )
            .await
            .unwrap();
        let version = store
            .append(
                aggregate_id,
                Version::new(2),
                vec![create_test_event(aggregate_id, 2, "Event3")],
            )
            .await
            .unwrap();

        assert_eq!(version, Version::new(3));
        let sequences: Vec<u64> = store
            .load_events(aggregate_id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                aggregate_id,
                Version::initial(),
                vec![create_test_event(aggregate_id, 0, "Event1")],
            )
            .await
            .unwrap();

        let result = store
            .append(
                aggregate_id,
                Version::initial(),
                vec![create_test_event(aggregate_id, 0, "Event1")],
            )
            .await;

        match result {
            Err(EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, Version::initial());
                assert_eq!(actual, Version::new(1));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn invalid_batch_stores_nothing() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let result = store
            .append(
                aggregate_id,
                Version::initial(),
                vec![
                    create_test_event(aggregate_id, 0, "Event1"),
                    create_test_event(aggregate_id, 5, "Event2"),
                ],
            )
            .await;

        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_aggregate_has_empty_history() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        assert!(store.load_events(aggregate_id).await.unwrap().is_empty());
        assert_eq!(
            store.current_version(aggregate_id).await.unwrap(),
            Version::initial()
        );
        assert!(!store.aggregate_exists(aggregate_id).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_appends_with_same_version_have_one_winner() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let attempts = (0..8).map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .append(
                        aggregate_id,
                        Version::initial(),
                        vec![create_test_event(aggregate_id, 0, "Created")],
                    )
                    .await
            })
        });

        let mut successes = 0;
        let mut conflicts = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            match attempt.await.unwrap() {
                Ok(_) => successes += 1,
                Err(e) if e.is_concurrency_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
        assert_eq!(store.load_events(aggregate_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn different_aggregates_do_not_conflict() {
        let store = InMemoryEventStore::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        let (a, b) = tokio::join!(
            store.append(
                first,
                Version::initial(),
                vec![create_test_event(first, 0, "Created")]
            ),
            store.append(
                second,
                Version::initial(),
                vec![create_test_event(second, 0, "Created")]
            ),
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn load_events_by_type_spans_streams() {
        let store = InMemoryEventStore::new();
        let first = AggregateId::new();
        let second = AggregateId::new();

        store
            .append(
                first,
                Version::initial(),
                vec![
                    create_test_event(first, 0, "Created"),
                    create_test_event(first, 1, "Renamed"),
                ],
            )
            .await
            .unwrap();
        store
            .append(
                second,
                Version::initial(),
                vec![create_test_event(second, 0, "Created")],
            )
            .await
            .unwrap();

        assert_eq!(store.load_events_by_type("Created").await.unwrap().len(), 2);
        assert_eq!(store.load_events_by_type("Renamed").await.unwrap().len(), 1);
    }
}
