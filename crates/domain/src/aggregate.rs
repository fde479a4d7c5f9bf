//! Aggregate and domain event traits, and the root that tracks replay state.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::DomainError;

/// Trait for domain events.
///
/// Domain events are immutable facts named in the past tense. Event enums are
/// serialized with `#[serde(tag = "type", content = "data")]` so the payload
/// carries its own kind.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event kind, used as the stored `event_type` and as the
    /// dispatcher's subscription key.
    fn event_type(&self) -> &'static str;

    /// The aggregate id carried in the payload, for events that name one.
    ///
    /// When present it must match the stream the event is stored in.
    fn aggregate_id(&self) -> Option<AggregateId> {
        None
    }
}

/// State of an event-sourced entity.
///
/// `apply` is the aggregate's table of mutators: an exhaustive `match` over
/// its event enum, one arm per kind. It must be a pure function of the
/// current state and the event and must never fail; validation belongs in the
/// behavior methods that decide which events to emit.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    /// Business rule violations raised by behavior methods.
    type Error: std::error::Error + Send + Sync;

    fn aggregate_type() -> &'static str;

    /// Every event kind `apply` has an arm for.
    fn event_types() -> &'static [&'static str];

    fn apply(&mut self, event: &Self::Event);
}

/// An event applied in memory but not yet appended to the store.
#[derive(Debug, Clone)]
pub struct UncommittedEvent<E> {
    pub sequence: u64,
    pub occurred_at: DateTime<Utc>,
    pub event: E,
}

/// Identity, version and pending events wrapped around an aggregate's state.
///
/// A root is owned by one command handler for the duration of one command
/// and dropped afterwards; nothing is cached between commands.
pub struct AggregateRoot<A: Aggregate> {
    id: AggregateId,
    version: Version,
    state: A,
    uncommitted: Vec<UncommittedEvent<A::Event>>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Starts a fresh aggregate at version 0 with no history.
    pub fn new(id: AggregateId) -> Self {
        Self {
            id,
            version: Version::initial(),
            state: A::default(),
            uncommitted: Vec::new(),
        }
    }

    /// Rebuilds an aggregate by replaying its persisted history in order.
    ///
    /// Replayed events are not recorded as uncommitted. Fails if an envelope
    /// belongs to another aggregate, breaks the sequence, or names a kind the
    /// aggregate cannot apply.
    pub fn from_history(id: AggregateId, history: &[EventEnvelope]) -> Result<Self, DomainError> {
        let mut root = Self::new(id);

        for envelope in history {
            if envelope.aggregate_id != id {
                return Err(DomainError::AggregateIdMismatch {
                    expected: id,
                    found: envelope.aggregate_id,
                });
            }
            let expected = root.version.next_sequence();
            if envelope.sequence != expected {
                return Err(DomainError::SequenceGap {
                    aggregate_id: id,
                    expected,
                    found: envelope.sequence,
                });
            }

            let event = decode::<A>(envelope)?;
            root.check_event_id(&event)?;
            root.state.apply(&event);
            root.version = root.version.next();
        }

        Ok(root)
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }

    /// Number of events applied so far, committed or not.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Version the store holds for this aggregate, i.e. before pending events.
    pub fn committed_version(&self) -> Version {
        Version::new(self.version.as_u64() - self.uncommitted.len() as u64)
    }

    pub fn state(&self) -> &A {
        &self.state
    }

    /// Applies a new event: mutates state, bumps the version and records the
    /// event as uncommitted.
    pub fn apply(&mut self, event: A::Event) {
        self.state.apply(&event);
        self.uncommitted.push(UncommittedEvent {
            sequence: self.version.next_sequence(),
            occurred_at: Utc::now(),
            event,
        });
        self.version = self.version.next();
    }

    /// Runs a behavior against the current state and applies what it emits.
    ///
    /// If the behavior rejects the command nothing is applied.
    pub fn execute<F>(&mut self, behavior: F) -> Result<(), A::Error>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        for event in behavior(&self.state)? {
            self.apply(event);
        }
        Ok(())
    }

    pub fn uncommitted_events(&self) -> &[UncommittedEvent<A::Event>] {
        &self.uncommitted
    }

    pub fn has_uncommitted(&self) -> bool {
        !self.uncommitted.is_empty()
    }

    /// Drops pending events once they have been appended.
    pub fn clear_uncommitted(&mut self) {
        self.uncommitted.clear();
    }

    /// Drains the pending events, leaving the version untouched.
    pub fn take_uncommitted(&mut self) -> Vec<UncommittedEvent<A::Event>> {
        std::mem::take(&mut self.uncommitted)
    }

    /// Builds store envelopes for the pending events, in order.
    pub fn uncommitted_envelopes(&self) -> Result<Vec<EventEnvelope>, DomainError> {
        self.uncommitted
            .iter()
            .map(|pending| {
                self.check_event_id(&pending.event)?;
                Ok(EventEnvelope::builder()
                    .aggregate_id(self.id)
                    .aggregate_type(A::aggregate_type())
                    .event_type(pending.event.event_type())
                    .sequence(pending.sequence)
                    .timestamp(pending.occurred_at)
                    .payload(&pending.event)?
                    .build())
            })
            .collect()
    }
}

impl<A: Aggregate> AggregateRoot<A> {
    fn check_event_id(&self, event: &A::Event) -> Result<(), DomainError> {
        match event.aggregate_id() {
            Some(found) if found != self.id => Err(DomainError::AggregateIdMismatch {
                expected: self.id,
                found,
            }),
            _ => Ok(()),
        }
    }
}

impl<A: Aggregate> std::fmt::Debug for AggregateRoot<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRoot")
            .field("aggregate_type", &A::aggregate_type())
            .field("id", &self.id)
            .field("version", &self.version)
            .field("uncommitted", &self.uncommitted.len())
            .finish()
    }
}

fn decode<A: Aggregate>(envelope: &EventEnvelope) -> Result<A::Event, DomainError> {
    let unknown = || DomainError::UnknownEventKind {
        aggregate_type: A::aggregate_type(),
        event_type: envelope.event_type.clone(),
    };

    if !A::event_types().contains(&envelope.event_type.as_str()) {
        return Err(unknown());
    }
    let event: A::Event = serde_json::from_value(envelope.payload.clone())?;
    if event.event_type() != envelope.event_type {
        return Err(unknown());
    }

    Ok(event)
}
