//! Hooking projections up to the event dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{BoxError, EventDispatcher, EventHandler};
use event_store::EventEnvelope;

use crate::projection::Projection;

/// Adapts a [`Projection`] to the dispatcher's [`EventHandler`] interface.
pub struct ProjectionSubscriber<P: Projection> {
    projection: Arc<P>,
}

impl<P: Projection> ProjectionSubscriber<P> {
    pub fn new(projection: Arc<P>) -> Self {
        Self { projection }
    }
}

#[async_trait]
impl<P: Projection + 'static> EventHandler for ProjectionSubscriber<P> {
    fn name(&self) -> &str {
        self.projection.name()
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<(), BoxError> {
        self.projection.handle(event).await?;
        metrics::counter!("projection_events_processed", "projection" => self.projection.name())
            .increment(1);
        Ok(())
    }
}

/// Subscribes `projection` to every event kind it declares.
///
/// One adapter is shared across all of the projection's subscriptions.
pub fn subscribe_projection<P: Projection + 'static>(
    dispatcher: &mut EventDispatcher,
    projection: Arc<P>,
) {
    let event_types = projection.event_types();
    let subscriber: Arc<dyn EventHandler> = Arc::new(ProjectionSubscriber::new(projection));
    for event_type in event_types {
        dispatcher.subscribe(*event_type, Arc::clone(&subscriber));
    }
}
