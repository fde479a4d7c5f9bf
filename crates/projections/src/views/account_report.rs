//! Account report read model: one row per account with its display name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::AccountEvent;
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;
use crate::{ProjectionError, Result};

const NAME: &str = "AccountReportView";

/// A row of the account report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReportRow {
    pub id: AggregateId,
    /// `None` until the account's first `NameSet`.
    pub name: Option<String>,
}

/// Denormalizer for account reports.
///
/// Rows are created on `AccountCreated` and renamed on `NameSet`.
#[derive(Clone)]
pub struct AccountReportView {
    rows: Arc<RwLock<HashMap<AggregateId, AccountReportRow>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl AccountReportView {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    pub async fn get(&self, id: AggregateId) -> Option<AccountReportRow> {
        self.rows.read().await.get(&id).cloned()
    }

    /// All rows, ordered by account id.
    pub async fn rows(&self) -> Vec<AccountReportRow> {
        let mut rows: Vec<_> = self.rows.read().await.values().cloned().collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    pub async fn find_by_name(&self, name: &str) -> Vec<AccountReportRow> {
        self.rows
            .read()
            .await
            .values()
            .filter(|row| row.name.as_deref() == Some(name))
            .cloned()
            .collect()
    }
}

impl Default for AccountReportView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for AccountReportView {
    fn name(&self) -> &'static str {
        NAME
    }

    fn event_types(&self) -> &'static [&'static str] {
        &[AccountEvent::ACCOUNT_CREATED, AccountEvent::NAME_SET]
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let account_event: AccountEvent = serde_json::from_value(event.payload.clone())?;
        let id = event.aggregate_id;

        let mut rows = self.rows.write().await;
        match account_event {
            AccountEvent::AccountCreated(_) => {
                rows.entry(id)
                    .or_insert(AccountReportRow { id, name: None });
            }
            AccountEvent::NameSet(data) => {
                let row = rows.get_mut(&id).ok_or(ProjectionError::UnknownRow {
                    projection: NAME,
                    aggregate_id: id,
                })?;
                row.name = Some(data.full_name());
            }
        }
        drop(rows);

        let mut pos = self.position.write().await;
        *pos = pos.advance();
        tracing::trace!(account_id = %id, event_type = %event.event_type, "account report updated");
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        self.rows.write().await.clear();
        *self.position.write().await = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for AccountReportView {
    fn name(&self) -> &'static str {
        NAME
    }

    fn count(&self) -> usize {
        // try_read so a caller never blocks on a writer; 0 while locked
        self.rows.try_read().map(|rows| rows.len()).unwrap_or(0)
    }
}
