//! Sample account domain: one aggregate, two events, two commands.

mod aggregate;
mod commands;
mod events;
mod handlers;

pub use aggregate::Account;
pub use commands::{CreateAccount, RenameAccount};
pub use events::{AccountCreatedData, AccountEvent, NameSetData};
pub use handlers::{CreateAccountHandler, RenameAccountHandler};

use event_store::EventStore;
use thiserror::Error;

use crate::context::CqrsContextBuilder;

/// Business rule violations raised by account behaviors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountError {
    #[error("First and last name must not be empty")]
    EmptyName,

    #[error("Account has not been opened")]
    NotOpen,
}

/// Registers the account command handlers on a context builder.
///
/// `max_attempts` bounds how often a rename is retried after a concurrency
/// conflict.
pub fn register<S: EventStore + Clone + 'static>(
    builder: CqrsContextBuilder<S>,
    max_attempts: usize,
) -> CqrsContextBuilder<S> {
    builder
        .command_handler::<CreateAccount, _, _>(CreateAccountHandler::new)
        .command_handler::<RenameAccount, _, _>(move |repository| {
            RenameAccountHandler::new(repository, max_attempts)
        })
}
