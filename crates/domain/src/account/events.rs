//! Account domain events.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

/// Events that can occur on an account aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AccountEvent {
    /// Account was opened. Always the first event of a stream.
    AccountCreated(AccountCreatedData),

    /// Account holder's name was set or changed.
    NameSet(NameSetData),
}

impl AccountEvent {
    pub const ACCOUNT_CREATED: &'static str = "AccountCreated";
    pub const NAME_SET: &'static str = "NameSet";
}

impl DomainEvent for AccountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AccountEvent::AccountCreated(_) => Self::ACCOUNT_CREATED,
            AccountEvent::NameSet(_) => Self::NAME_SET,
        }
    }

    fn aggregate_id(&self) -> Option<AggregateId> {
        match self {
            AccountEvent::AccountCreated(data) => Some(data.account_id),
            AccountEvent::NameSet(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreatedData {
    pub account_id: AggregateId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameSetData {
    pub first_name: String,
    pub last_name: String,
}

impl NameSetData {
    /// The name as shown on read models: first and last joined by a space.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
