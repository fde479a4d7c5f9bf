//! Account commands.

use common::AggregateId;
use event_store::Version;

use crate::command::Command;

/// Opens a new account for the given holder. Replies with the new account id.
#[derive(Debug, Clone)]
pub struct CreateAccount {
    pub first_name: String,
    pub last_name: String,
}

impl CreateAccount {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

impl Command for CreateAccount {
    type Output = AggregateId;
    const NAME: &'static str = "CreateAccount";
}

/// Changes the holder name of an existing account. Replies with the
/// account's new version.
#[derive(Debug, Clone)]
pub struct RenameAccount {
    pub account_id: AggregateId,
    pub first_name: String,
    pub last_name: String,
}

impl RenameAccount {
    pub fn new(
        account_id: AggregateId,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }
}

impl Command for RenameAccount {
    type Output = Version;
    const NAME: &'static str = "RenameAccount";
}
