//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::account::AccountError;
use crate::dispatcher::ProjectionFailure;

/// Errors surfaced by the write side.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The event store failed, including optimistic concurrency conflicts.
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("No handler registered for command {command}")]
    NoHandlerRegistered { command: &'static str },

    /// A second handler was registered for a command type. Fatal at startup.
    #[error("Handler already registered for command {command}")]
    DuplicateHandler { command: &'static str },

    /// A stored event names a kind the aggregate has no mutator for.
    #[error("{aggregate_type} cannot apply event kind {event_type}")]
    UnknownEventKind {
        aggregate_type: &'static str,
        event_type: String,
    },

    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    #[error("Event for aggregate {found} replayed into aggregate {expected}")]
    AggregateIdMismatch {
        expected: AggregateId,
        found: AggregateId,
    },

    #[error("History of {aggregate_id} is not contiguous: expected sequence {expected}, found {found}")]
    SequenceGap {
        aggregate_id: AggregateId,
        expected: u64,
        found: u64,
    },

    /// Events were committed but one or more projections failed to handle them.
    #[error(transparent)]
    ProjectionFailure(#[from] ProjectionFailure),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bus handed a handler a value of the wrong type.
    #[error("Handler for {expected} received a different command type")]
    TypeMismatch { expected: &'static str },
}

impl DomainError {
    /// Returns true when reloading and retrying the command may succeed.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::EventStore(e) if e.is_concurrency_conflict())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::Version;

    #[test]
    fn only_store_conflicts_are_retryable() {
        let conflict = DomainError::EventStore(EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::new(1),
            actual: Version::new(2),
        });
        let missing = DomainError::AggregateNotFound {
            aggregate_type: "Account",
            aggregate_id: AggregateId::new(),
        };

        assert!(conflict.is_concurrency_conflict());
        assert!(!missing.is_concurrency_conflict());
    }
}
