//! Broadcast of committed events to subscribed handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use event_store::EventEnvelope;
use thiserror::Error;

/// Error type handlers report back to the dispatcher.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A subscriber to committed events, typically a projection.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used when reporting this handler's failures.
    fn name(&self) -> &str;

    async fn handle(&self, event: &EventEnvelope) -> Result<(), BoxError>;
}

/// One handler's failure to process one event.
#[derive(Debug, Error)]
#[error("{subscriber} failed on {event_type} #{sequence} of {aggregate_id}: {error}")]
pub struct SubscriberFailure {
    pub subscriber: String,
    pub event_type: String,
    pub aggregate_id: AggregateId,
    pub sequence: u64,
    #[source]
    pub error: BoxError,
}

/// Every handler failure collected while publishing.
///
/// The events involved are already committed; only the failing subscribers
/// are stale.
#[derive(Debug, Error)]
#[error("{} projection handler(s) failed", .failures.len())]
pub struct ProjectionFailure {
    pub failures: Vec<SubscriberFailure>,
}

impl ProjectionFailure {
    pub fn subscribers(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.subscriber.as_str())
    }

    fn merge(failures: Vec<ProjectionFailure>) -> Option<Self> {
        let failures: Vec<SubscriberFailure> =
            failures.into_iter().flat_map(|f| f.failures).collect();
        (!failures.is_empty()).then_some(Self { failures })
    }
}

/// Registry of handlers keyed by event type.
///
/// Handlers for one event type are invoked in registration order. Handlers
/// are registered at startup, before the dispatcher is shared.
#[derive(Default)]
pub struct EventDispatcher {
    subscriptions: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler for `event_type`. Any number of handlers may subscribe
    /// to the same type.
    pub fn subscribe(&mut self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_type = event_type.into();
        tracing::debug!(%event_type, handler = handler.name(), "subscribed");
        self.subscriptions.entry(event_type).or_default().push(handler);
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscriptions.get(event_type).map_or(0, Vec::len)
    }

    /// Delivers `event` to every handler subscribed to its type.
    ///
    /// A failing handler does not stop delivery to the ones after it; all
    /// failures are returned together once every handler has been tried.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, sequence = event.sequence))]
    pub async fn publish(&self, event: &EventEnvelope) -> Result<(), ProjectionFailure> {
        let Some(handlers) = self.subscriptions.get(&event.event_type) else {
            return Ok(());
        };

        let mut failures = Vec::new();
        for handler in handlers {
            metrics::counter!("events_published").increment(1);
            if let Err(error) = handler.handle(event).await {
                metrics::counter!("projection_failures").increment(1);
                tracing::warn!(handler = handler.name(), %error, "event handler failed");
                failures.push(SubscriberFailure {
                    subscriber: handler.name().to_string(),
                    event_type: event.event_type.clone(),
                    aggregate_id: event.aggregate_id,
                    sequence: event.sequence,
                    error,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ProjectionFailure { failures })
        }
    }

    /// Publishes a batch in order, continuing past failures.
    pub async fn publish_all(&self, events: &[EventEnvelope]) -> Result<(), ProjectionFailure> {
        let mut failures = Vec::new();
        for event in events {
            if let Err(failure) = self.publish(event).await {
                failures.push(failure);
            }
        }

        match ProjectionFailure::merge(failures) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }
}
