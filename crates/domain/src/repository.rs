//! Loading aggregates by replay and saving them through the store and dispatcher.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use common::AggregateId;
use event_store::{EventStore, Version};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::aggregate::{Aggregate, AggregateRoot};
use crate::dispatcher::EventDispatcher;
use crate::error::DomainError;

/// One async lock per aggregate id, held from append through publish.
///
/// Entries are dropped again once nobody holds or waits for them.
#[derive(Default)]
struct SaveLocks {
    locks: Mutex<HashMap<AggregateId, Arc<Mutex<()>>>>,
}

impl SaveLocks {
    async fn acquire(&self, aggregate_id: AggregateId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(aggregate_id).or_default())
        };
        lock.lock_owned().await
    }

    async fn release(&self, aggregate_id: AggregateId, guard: OwnedMutexGuard<()>) {
        drop(guard);
        let mut locks = self.locks.lock().await;
        if let Some(lock) = locks.get(&aggregate_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(&aggregate_id);
            }
        }
    }
}

/// Loads aggregates from their event history and saves their new events.
///
/// Saving appends first and publishes second: events that failed to persist
/// are never shown to projections. Saves of one aggregate are serialized
/// across clones of the repository, so its events reach subscribers in
/// sequence order.
pub struct DomainRepository<S: EventStore> {
    store: S,
    dispatcher: Arc<EventDispatcher>,
    save_locks: Arc<SaveLocks>,
}

impl<S: EventStore + Clone> Clone for DomainRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
            save_locks: Arc::clone(&self.save_locks),
        }
    }
}

impl<S: EventStore> DomainRepository<S> {
    pub fn new(store: S, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            save_locks: Arc::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Loads an aggregate that must already exist.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn load<A: Aggregate>(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<AggregateRoot<A>, DomainError> {
        let history = self.store.load_events(aggregate_id).await?;
        if history.is_empty() {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            });
        }
        AggregateRoot::from_history(aggregate_id, &history)
    }

    /// Loads an aggregate, or starts a fresh version-0 one if it has no history.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::aggregate_type()))]
    pub async fn load_or_new<A: Aggregate>(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<AggregateRoot<A>, DomainError> {
        let history = self.store.load_events(aggregate_id).await?;
        AggregateRoot::from_history(aggregate_id, &history)
    }

    /// Appends the aggregate's uncommitted events and publishes them.
    ///
    /// With nothing pending this is a no-op. On a concurrency conflict the
    /// pending events stay on the aggregate so the caller can reload and
    /// retry. Once the append succeeds the events are committed for good: a
    /// projection failing afterwards is reported as
    /// [`DomainError::ProjectionFailure`] but nothing is rolled back.
    ///
    /// Returns the aggregate's version after the save.
    #[tracing::instrument(
        skip(self, aggregate),
        fields(aggregate_type = A::aggregate_type(), aggregate_id = %aggregate.id())
    )]
    pub async fn save<A: Aggregate>(
        &self,
        aggregate: &mut AggregateRoot<A>,
    ) -> Result<Version, DomainError> {
        if !aggregate.has_uncommitted() {
            return Ok(aggregate.version());
        }

        let aggregate_id = aggregate.id();
        let guard = self.save_locks.acquire(aggregate_id).await;
        let result = self.append_and_publish(aggregate).await;
        self.save_locks.release(aggregate_id, guard).await;
        result
    }

    async fn append_and_publish<A: Aggregate>(
        &self,
        aggregate: &mut AggregateRoot<A>,
    ) -> Result<Version, DomainError> {
        let expected = aggregate.committed_version();
        let events = aggregate.uncommitted_envelopes()?;

        let version = match self
            .store
            .append(aggregate.id(), expected, events.clone())
            .await
        {
            Ok(version) => version,
            Err(e) => {
                if e.is_concurrency_conflict() {
                    tracing::warn!(%expected, "aggregate changed since it was loaded");
                }
                return Err(e.into());
            }
        };
        aggregate.clear_uncommitted();
        tracing::debug!(%version, count = events.len(), "events committed");

        self.dispatcher.publish_all(&events).await?;
        Ok(version)
    }

    /// Runs a load-apply-save operation, re-running it from scratch when it
    /// fails with a concurrency conflict.
    ///
    /// At most `max_attempts` runs are made (at least one). Any other error,
    /// or the conflict from the final attempt, is returned as is.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        max_attempts: usize,
        mut operation: F,
    ) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation().await {
                Err(e) if e.is_concurrency_conflict() && attempt < max_attempts => {
                    metrics::counter!("command_retries").increment(1);
                    tracing::info!(attempt, max_attempts, "retrying after concurrency conflict");
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
