//! Write side of the CQRS dispatch core.
//!
//! This crate provides:
//! - [`Aggregate`] and [`AggregateRoot`] for event-sourced entities rebuilt by replay
//! - [`CommandBus`] routing each command to exactly one [`CommandHandler`]
//! - [`EventDispatcher`] broadcasting committed events to subscribed [`EventHandler`]s
//! - [`DomainRepository`] tying load/save to the event store and the dispatcher
//! - [`CqrsContext`] holding all of the above, wired explicitly at startup
//! - the sample `account` domain

pub mod account;
pub mod aggregate;
pub mod command;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod repository;

pub use account::{
    Account, AccountCreatedData, AccountError, AccountEvent, CreateAccount, CreateAccountHandler,
    NameSetData, RenameAccount, RenameAccountHandler,
};
pub use aggregate::{Aggregate, AggregateRoot, DomainEvent, UncommittedEvent};
pub use command::{Command, CommandBus, CommandHandler};
pub use context::{CqrsContext, CqrsContextBuilder};
pub use dispatcher::{BoxError, EventDispatcher, EventHandler, ProjectionFailure, SubscriberFailure};
pub use error::DomainError;
pub use repository::DomainRepository;
