//! Command routing: exactly one handler per command type.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DomainError;

/// An intent to change state.
///
/// Commands are plain values routed by their Rust type.
pub trait Command: Send + 'static {
    /// What a successful handler returns to the sender.
    type Output: Send + 'static;

    /// Name used in logs, metrics and routing errors.
    const NAME: &'static str;
}

/// Application-level operation for one command type.
#[async_trait]
pub trait CommandHandler<C: Command>: Send + Sync {
    async fn handle(&self, command: C) -> Result<C::Output, DomainError>;
}

#[async_trait]
trait ErasedCommandHandler: Send + Sync {
    async fn handle_erased(
        &self,
        command: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, DomainError>;
}

struct TypedCommandHandler<C, H> {
    handler: H,
    _command: PhantomData<fn(C)>,
}

#[async_trait]
impl<C, H> ErasedCommandHandler for TypedCommandHandler<C, H>
where
    C: Command,
    H: CommandHandler<C>,
{
    async fn handle_erased(
        &self,
        command: Box<dyn Any + Send>,
    ) -> Result<Box<dyn Any + Send>, DomainError> {
        let command = command
            .downcast::<C>()
            .map_err(|_| DomainError::TypeMismatch { expected: C::NAME })?;
        let output = self.handler.handle(*command).await?;
        Ok(Box::new(output))
    }
}

/// Routes each command to the single handler registered for its type.
///
/// Unlike the event dispatcher a command is never broadcast. Handlers are
/// registered at startup; after that the bus is shared read-only.
#[derive(Default)]
pub struct CommandBus {
    handlers: HashMap<TypeId, Arc<dyn ErasedCommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to command type `C`.
    ///
    /// Registering a second handler for the same type is a configuration
    /// error and leaves the first binding in place.
    pub fn register_handler<C, H>(&mut self, handler: H) -> Result<(), DomainError>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let key = TypeId::of::<C>();
        if self.handlers.contains_key(&key) {
            return Err(DomainError::DuplicateHandler { command: C::NAME });
        }

        tracing::debug!(command = C::NAME, "registered command handler");
        self.handlers.insert(
            key,
            Arc::new(TypedCommandHandler {
                handler,
                _command: PhantomData,
            }),
        );
        Ok(())
    }

    pub fn has_handler<C: Command>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<C>())
    }

    /// Sends `command` to its handler and returns the handler's result.
    ///
    /// Any error the handler raises, concurrency conflicts included, is
    /// propagated unchanged.
    #[tracing::instrument(skip_all, fields(command = C::NAME))]
    pub async fn send<C: Command>(&self, command: C) -> Result<C::Output, DomainError> {
        let Some(handler) = self.handlers.get(&TypeId::of::<C>()) else {
            tracing::warn!("no handler registered");
            return Err(DomainError::NoHandlerRegistered { command: C::NAME });
        };

        metrics::counter!("commands_sent", "command" => C::NAME).increment(1);
        let output = handler.handle_erased(Box::new(command)).await?;

        output
            .downcast::<C::Output>()
            .map(|output| *output)
            .map_err(|_| DomainError::TypeMismatch { expected: C::NAME })
    }
}
