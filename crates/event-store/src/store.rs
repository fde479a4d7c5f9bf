use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Version};

/// Append-only persistence of per-aggregate event streams.
///
/// Implementations must make `append` atomic and isolated per aggregate id:
/// appends to different ids never conflict, while appends to the same id are
/// serialized and checked against `expected_version`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `events` to the stream of `aggregate_id`.
    ///
    /// Succeeds only if the stream is currently at `expected_version`; the
    /// events must carry sequences `expected_version, expected_version + 1, ..`.
    /// Either every event is stored or none is.
    ///
    /// Returns the stream's version after the append.
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version>;

    /// Returns the full history of an aggregate in sequence order.
    ///
    /// An id that was never written yields an empty history, not an error.
    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>>;

    /// Returns the current version of a stream, `Version::initial()` if absent.
    async fn current_version(&self, aggregate_id: AggregateId) -> Result<Version>;

    /// Returns every stored event of one kind, oldest first.
    async fn load_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;
}

#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Checks whether any event has been stored for the aggregate.
    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.current_version(aggregate_id).await? > Version::initial())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

#[async_trait]
impl<T: EventStore + ?Sized> EventStore for std::sync::Arc<T> {
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        (**self).append(aggregate_id, expected_version, events).await
    }

    async fn load_events(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        (**self).load_events(aggregate_id).await
    }

    async fn current_version(&self, aggregate_id: AggregateId) -> Result<Version> {
        (**self).current_version(aggregate_id).await
    }

    async fn load_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        (**self).load_events_by_type(event_type).await
    }
}

/// Checks that a batch is well formed before it reaches storage.
///
/// The batch must be non-empty, belong entirely to `aggregate_id`, share one
/// aggregate type and carry contiguous sequences starting at
/// `expected_version`.
pub fn validate_append(
    aggregate_id: AggregateId,
    expected_version: Version,
    events: &[EventEnvelope],
) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected_sequence = expected_version.next_sequence();
    for event in events {
        if event.aggregate_id != aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "event {} belongs to aggregate {}, not {aggregate_id}",
                event.event_id, event.aggregate_id
            )));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events must have the same aggregate type".to_string(),
            ));
        }
        if event.sequence != expected_sequence {
            return Err(EventStoreError::InvalidAppend(format!(
                "expected sequence {expected_sequence}, got {}",
                event.sequence
            )));
        }
        expected_sequence += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(aggregate_id: AggregateId, sequence: u64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Account")
            .event_type("NameSet")
            .sequence(sequence)
            .payload_raw(serde_json::json!({}))
            .build()
    }

    #[test]
    fn accepts_contiguous_batch_at_expected_version() {
        let id = AggregateId::new();
        let batch = vec![event(id, 2), event(id, 3)];
        assert!(validate_append(id, Version::new(2), &batch).is_ok());
    }

    #[test]
    fn rejects_empty_batch() {
        let result = validate_append(AggregateId::new(), Version::initial(), &[]);
        assert!(matches!(result, Err(EventStoreError::InvalidAppend(_))));
    }

    #[test]
    fn rejects_gap_in_sequence() {
        let id = AggregateId::new();
        let batch = vec![event(id, 0), event(id, 2)];
        assert!(validate_append(id, Version::initial(), &batch).is_err());
    }

    #[test]
    fn rejects_batch_not_starting_at_expected_version() {
        let id = AggregateId::new();
        let batch = vec![event(id, 1)];
        assert!(validate_append(id, Version::initial(), &batch).is_err());
    }

    #[test]
    fn rejects_foreign_aggregate() {
        let id = AggregateId::new();
        let batch = vec![event(AggregateId::new(), 0)];
        assert!(validate_append(id, Version::initial(), &batch).is_err());
    }
}
