//! Account command handlers.

use async_trait::async_trait;
use common::AggregateId;
use event_store::{EventStore, Version};

use crate::command::CommandHandler;
use crate::error::DomainError;
use crate::repository::DomainRepository;

use super::{Account, CreateAccount, RenameAccount};

/// Opens a new account and names it, returning the new account's id.
///
/// If a projection fails after the events are committed the command returns
/// [`DomainError::ProjectionFailure`] instead of the id. The account exists
/// regardless; its id is the `aggregate_id` of each
/// [`SubscriberFailure`](crate::SubscriberFailure) in the failure.
pub struct CreateAccountHandler<S: EventStore> {
    repository: DomainRepository<S>,
}

impl<S: EventStore> CreateAccountHandler<S> {
    pub fn new(repository: DomainRepository<S>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandHandler<CreateAccount> for CreateAccountHandler<S> {
    #[tracing::instrument(skip(self))]
    async fn handle(&self, command: CreateAccount) -> Result<AggregateId, DomainError> {
        let mut account = Account::open(AggregateId::new());
        account.execute(|a| a.set_name(&command.first_name, &command.last_name))?;

        self.repository.save(&mut account).await?;
        Ok(account.id())
    }
}

/// Renames an existing account, reloading and reapplying on conflicts.
pub struct RenameAccountHandler<S: EventStore> {
    repository: DomainRepository<S>,
    max_attempts: usize,
}

impl<S: EventStore> RenameAccountHandler<S> {
    pub fn new(repository: DomainRepository<S>, max_attempts: usize) -> Self {
        Self {
            repository,
            max_attempts,
        }
    }
}

#[async_trait]
impl<S: EventStore + 'static> CommandHandler<RenameAccount> for RenameAccountHandler<S> {
    #[tracing::instrument(skip(self))]
    async fn handle(&self, command: RenameAccount) -> Result<Version, DomainError> {
        let repository = &self.repository;
        let command = &command;

        repository
            .execute_with_retry(self.max_attempts, move || async move {
                let mut account = repository.load::<Account>(command.account_id).await?;
                account.execute(|a| a.set_name(&command.first_name, &command.last_name))?;
                repository.save(&mut account).await
            })
            .await
    }
}
