//! Account aggregate.

use common::AggregateId;

use crate::aggregate::{Aggregate, AggregateRoot};

use super::{AccountCreatedData, AccountError, AccountEvent, NameSetData};

/// State of an account, rebuilt from its events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    id: Option<AggregateId>,
    open: bool,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl Aggregate for Account {
    type Event = AccountEvent;
    type Error = AccountError;

    fn aggregate_type() -> &'static str {
        "Account"
    }

    fn event_types() -> &'static [&'static str] {
        &[AccountEvent::ACCOUNT_CREATED, AccountEvent::NAME_SET]
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AccountEvent::AccountCreated(data) => {
                self.id = Some(data.account_id);
                self.open = true;
            }
            AccountEvent::NameSet(data) => {
                self.first_name = Some(data.first_name.clone());
                self.last_name = Some(data.last_name.clone());
            }
        }
    }
}

impl Account {
    /// Opens a new account under `id`, recording the creation event.
    pub fn open(id: AggregateId) -> AggregateRoot<Account> {
        let mut root = AggregateRoot::new(id);
        root.apply(AccountEvent::AccountCreated(AccountCreatedData { account_id: id }));
        root
    }

    /// Id named by the creation event.
    pub fn id(&self) -> Option<AggregateId> {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Full name, once one has been set.
    pub fn name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            _ => None,
        }
    }

    /// Decides the events for naming the account holder.
    pub fn set_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Vec<AccountEvent>, AccountError> {
        if !self.open {
            return Err(AccountError::NotOpen);
        }
        let (first_name, last_name) = (first_name.trim(), last_name.trim());
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AccountError::EmptyName);
        }

        Ok(vec![AccountEvent::NameSet(NameSetData {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })])
    }
}
