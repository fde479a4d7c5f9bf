//! Explicit wiring of the bus, dispatcher, store and repository.

use std::sync::Arc;

use event_store::EventStore;

use crate::command::{Command, CommandBus, CommandHandler};
use crate::dispatcher::{EventDispatcher, EventHandler};
use crate::error::DomainError;
use crate::repository::DomainRepository;

type Registration<S> =
    Box<dyn FnOnce(&mut CommandBus, &DomainRepository<S>) -> Result<(), DomainError> + Send>;

/// Everything a command submitter or handler needs, built once at startup
/// and passed around explicitly.
pub struct CqrsContext<S: EventStore> {
    store: S,
    dispatcher: Arc<EventDispatcher>,
    command_bus: Arc<CommandBus>,
    repository: DomainRepository<S>,
}

impl<S: EventStore + Clone + 'static> CqrsContext<S> {
    pub fn builder(store: S) -> CqrsContextBuilder<S> {
        CqrsContextBuilder {
            store,
            dispatcher: EventDispatcher::new(),
            registrations: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn command_bus(&self) -> &Arc<CommandBus> {
        &self.command_bus
    }

    pub fn repository(&self) -> &DomainRepository<S> {
        &self.repository
    }

    /// Shorthand for `command_bus().send(command)`.
    pub async fn send<C: Command>(&self, command: C) -> Result<C::Output, DomainError> {
        self.command_bus.send(command).await
    }
}

/// Collects subscriptions and command handlers before freezing them into a
/// [`CqrsContext`].
///
/// Subscriptions must be complete before any handler is built, since handlers
/// hold a repository that shares the finished dispatcher.
pub struct CqrsContextBuilder<S: EventStore> {
    store: S,
    dispatcher: EventDispatcher,
    registrations: Vec<Registration<S>>,
}

impl<S: EventStore + Clone + 'static> CqrsContextBuilder<S> {
    pub fn subscribe(mut self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.dispatcher.subscribe(event_type, handler);
        self
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    /// Registers the handler for `C`, built from the context's repository
    /// once the dispatcher is final.
    pub fn command_handler<C, H, F>(mut self, factory: F) -> Self
    where
        C: Command,
        H: CommandHandler<C> + 'static,
        F: FnOnce(DomainRepository<S>) -> H + Send + 'static,
    {
        self.registrations.push(Box::new(move |bus, repository| {
            bus.register_handler::<C, H>(factory(repository.clone()))
        }));
        self
    }

    /// Freezes the configuration.
    ///
    /// Fails with [`DomainError::DuplicateHandler`] if two handlers were
    /// registered for one command type.
    pub fn build(self) -> Result<CqrsContext<S>, DomainError> {
        let dispatcher = Arc::new(self.dispatcher);
        let repository = DomainRepository::new(self.store.clone(), Arc::clone(&dispatcher));

        let mut command_bus = CommandBus::new();
        for registration in self.registrations {
            registration(&mut command_bus, &repository)?;
        }

        Ok(CqrsContext {
            store: self.store,
            dispatcher,
            command_bus: Arc::new(command_bus),
            repository,
        })
    }
}
